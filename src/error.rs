//! Client-level error taxonomy shared by the credential manager, orchestrator, and pager.

// self
use crate::{_prelude::*, pagination::PageError};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Closed set of failure categories surfaced by every client call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Bad client credentials or an expired/revoked bearer token.
	Authentication,
	/// The credential is valid but lacks permission for the resource.
	Forbidden,
	/// The addressed entity does not exist.
	NotFound,
	/// The request payload failed field-level validation.
	Validation,
	/// The rolling quota stayed exhausted after every permitted retry.
	RateLimited,
	/// The API answered with a 5xx status.
	Server,
	/// No usable response: network failure, malformed body, unexpected status, or a request that
	/// could not be built locally.
	Transport,
}
impl ErrorKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Authentication => "authentication",
			ErrorKind::Forbidden => "forbidden",
			ErrorKind::NotFound => "not_found",
			ErrorKind::Validation => "validation",
			ErrorKind::RateLimited => "rate_limited",
			ErrorKind::Server => "server",
			ErrorKind::Transport => "transport",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Field-level validation failure reported by the API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
	/// API field name that failed validation.
	pub field: String,
	/// Human-readable explanation supplied by the API.
	pub message: String,
}

/// Canonical client error exposed by public APIs.
///
/// HTTP-derived variants keep the raw response payload (JSON when the body parsed, otherwise the
/// body text) for diagnostics.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration or request construction problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// No usable response was received.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Token exchange rejected or bearer token refused.
	#[error("Authentication failed: {reason}.")]
	Authentication {
		/// Provider- or client-supplied reason string.
		reason: String,
		/// HTTP status code, when a response was received.
		status: Option<u16>,
		/// Raw response payload, when one was received.
		payload: Option<Value>,
	},
	/// The API denied access (HTTP 403).
	#[error("Access denied: {message}.")]
	Forbidden {
		/// Message extracted from the response payload.
		message: String,
		/// Raw response payload.
		payload: Option<Value>,
	},
	/// The entity does not exist (HTTP 404).
	#[error("Resource not found: {message}.")]
	NotFound {
		/// Message extracted from the response payload.
		message: String,
		/// Raw response payload.
		payload: Option<Value>,
	},
	/// The API rejected the payload (HTTP 400).
	#[error("Request failed validation with {count} field error(s).", count = .fields.len())]
	Validation {
		/// Field-level errors; empty when the API returned none.
		fields: Vec<FieldError>,
		/// Raw response payload.
		payload: Option<Value>,
	},
	/// Retries were exhausted while the API kept answering HTTP 429.
	#[error("Rate limit exceeded; retry after {millis} ms.", millis = .retry_after.as_millis())]
	RateLimited {
		/// Delay suggested by the last `Retry-After` header (or the configured default).
		retry_after: Duration,
		/// Raw response payload.
		payload: Option<Value>,
	},
	/// The API failed with a 5xx status.
	#[error("Server error {status}: {message}.")]
	Server {
		/// HTTP status code.
		status: u16,
		/// Message extracted from the response payload.
		message: String,
		/// Raw response payload.
		payload: Option<Value>,
	},
}
impl Error {
	/// Returns the taxonomy bucket for this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Config(_) | Self::Transport(_) => ErrorKind::Transport,
			Self::Authentication { .. } => ErrorKind::Authentication,
			Self::Forbidden { .. } => ErrorKind::Forbidden,
			Self::NotFound { .. } => ErrorKind::NotFound,
			Self::Validation { .. } => ErrorKind::Validation,
			Self::RateLimited { .. } => ErrorKind::RateLimited,
			Self::Server { .. } => ErrorKind::Server,
		}
	}

	/// HTTP status code associated with the failure, when a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Config(_) => None,
			Self::Transport(err) => err.status(),
			Self::Authentication { status, .. } => *status,
			Self::Forbidden { .. } => Some(403),
			Self::NotFound { .. } => Some(404),
			Self::Validation { .. } => Some(400),
			Self::RateLimited { .. } => Some(429),
			Self::Server { status, .. } => Some(*status),
		}
	}

	/// Raw response payload kept for diagnostics.
	pub fn payload(&self) -> Option<&Value> {
		match self {
			Self::Config(_) => None,
			Self::Transport(err) => err.payload(),
			Self::Authentication { payload, .. }
			| Self::Forbidden { payload, .. }
			| Self::NotFound { payload, .. }
			| Self::Validation { payload, .. }
			| Self::RateLimited { payload, .. }
			| Self::Server { payload, .. } => payload.as_ref(),
		}
	}
}

/// Configuration and request-construction failures raised before any network traffic.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Neither a tenant name nor an explicit base URL was supplied.
	#[error("Either tenant or base_url must be provided.")]
	MissingBaseUrl,
	/// The base URL cannot be parsed.
	#[error("Base URL `{url}` is invalid.")]
	InvalidBaseUrl {
		/// Offending URL string.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The base URL uses a scheme other than http/https.
	#[error("Base URL scheme `{scheme}` is not supported.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Client id is empty.
	#[error("Client id cannot be empty.")]
	EmptyClientId,
	/// Client secret is empty.
	#[error("Client secret cannot be empty.")]
	EmptyClientSecret,
	/// Throttle threshold is outside `(0, 1]`.
	#[error("Throttle threshold must be within (0, 1], got {value}.")]
	InvalidThrottleThreshold {
		/// Rejected threshold.
		value: f64,
	},
	/// Rate limiting is enabled with a zero request budget.
	#[error("Rate limit max_requests must be positive.")]
	ZeroMaxRequests,
	/// Rate limiting is enabled with a zero-length window.
	#[error("Rate limit window must be positive.")]
	ZeroWindow,
	/// A request path produced an invalid URL.
	#[error("Request path `{path}` does not form a valid URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// An update payload did not serialize to a JSON object, so the entity id cannot be merged.
	#[error("Update payload must serialize to a JSON object.")]
	UpdateNotObject,
	/// A request body could not be serialized to JSON.
	#[error("Request body could not be serialized.")]
	BodySerialization(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}

/// Failures where no usable API response was obtained.
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure (DNS, TCP, TLS, timeout).
	#[error("Network error occurred while calling `{path}`.")]
	Network {
		/// Request path.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// A successful response body did not match the expected shape.
	#[error("Response from `{path}` could not be decoded.")]
	Decode {
		/// Request path.
		path: String,
		/// HTTP status code of the response.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The API answered with a status outside the documented taxonomy.
	#[error("Unexpected HTTP status {status} from `{path}`.")]
	UnexpectedStatus {
		/// Request path.
		path: String,
		/// HTTP status code.
		status: u16,
		/// Raw response payload.
		payload: Option<Value>,
	},
	/// A list endpoint returned a page that cannot be interpreted.
	#[error("List response from `{path}` is malformed.")]
	MalformedPage {
		/// Request path.
		path: String,
		/// Shape violation.
		#[source]
		source: PageError,
	},
	/// A create/update/get call returned an empty entity array.
	#[error("Response from `{path}` did not contain a `{items_key}` entry.")]
	EmptyResult {
		/// Request path.
		path: String,
		/// Key the entity array was expected under.
		items_key: String,
		/// Raw response payload.
		payload: Option<Value>,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}

	/// HTTP status code, when a response was received.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Network { .. } | Self::MalformedPage { .. } | Self::EmptyResult { .. } => None,
			Self::Decode { status, .. } | Self::UnexpectedStatus { status, .. } => Some(*status),
		}
	}

	/// Raw response payload, when one was kept.
	pub fn payload(&self) -> Option<&Value> {
		match self {
			Self::UnexpectedStatus { payload, .. } | Self::EmptyResult { payload, .. } =>
				payload.as_ref(),
			_ => None,
		}
	}
}
