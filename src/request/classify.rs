//! Mapping of non-2xx API responses onto the client error taxonomy.

// self
use crate::{
	_prelude::*,
	error::{FieldError, TransportError},
};

const CREDENTIAL_ERROR_CODES: [&str; 3] = ["invalid_client", "invalid_grant", "unauthorized_client"];

/// Classifies a non-2xx, non-429 response.
pub(crate) fn classify_failure(path: &str, status: u16, payload: Option<Value>) -> Error {
	match status {
		400 => classify_bad_request(payload),
		401 => Error::Authentication {
			reason: message_or(payload.as_ref(), "Bearer token was rejected"),
			status: Some(401),
			payload,
		},
		403 => Error::Forbidden { message: message_or(payload.as_ref(), "Access denied"), payload },
		404 => Error::NotFound {
			message: message_or(payload.as_ref(), &format!("Nothing found at {path}")),
			payload,
		},
		500..=599 => Error::Server {
			status,
			message: message_or(payload.as_ref(), "Server error"),
			payload,
		},
		_ => TransportError::UnexpectedStatus { path: path.to_owned(), status, payload }.into(),
	}
}

fn classify_bad_request(payload: Option<Value>) -> Error {
	if let Some(fields) = field_errors(payload.as_ref()) {
		return Error::Validation { fields, payload };
	}
	if signals_bad_credentials(payload.as_ref()) {
		return Error::Authentication {
			reason: message_or(payload.as_ref(), "Bad credentials"),
			status: Some(400),
			payload,
		};
	}

	Error::Validation { fields: Vec::new(), payload }
}

/// Field errors from a `{ "errors": [{ "field", "message" }] }` payload.
fn field_errors(payload: Option<&Value>) -> Option<Vec<FieldError>> {
	let errors = payload?.get("errors")?.as_array()?;
	let text = |entry: &Value, key: &str| {
		entry.get(key).and_then(Value::as_str).unwrap_or_default().to_owned()
	};

	Some(
		errors
			.iter()
			.map(|entry| FieldError { field: text(entry, "field"), message: text(entry, "message") })
			.collect(),
	)
}

fn signals_bad_credentials(payload: Option<&Value>) -> bool {
	let Some(payload) = payload else {
		return false;
	};

	let known_code = payload
		.get("error")
		.and_then(Value::as_str)
		.is_some_and(|code| CREDENTIAL_ERROR_CODES.contains(&code));

	known_code
		|| message(payload).is_some_and(|text| text.to_ascii_lowercase().contains("credentials"))
}

/// Best human-readable message carried by an error payload.
fn message(payload: &Value) -> Option<String> {
	if let Value::String(text) = payload {
		return Some(text.clone());
	}

	["error_description", "message", "error"]
		.into_iter()
		.find_map(|key| payload.get(key).and_then(Value::as_str))
		.map(str::to_owned)
}

fn message_or(payload: Option<&Value>, fallback: &str) -> String {
	payload.and_then(message).unwrap_or_else(|| fallback.to_owned())
}
