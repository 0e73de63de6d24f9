//! Immutable bearer credential and exchange failure models.

// self
use crate::{_prelude::*, auth::Secret};

/// Bearer token together with its effective expiry.
///
/// `expires_at` already has the safety margin subtracted, so a credential is refreshed before the
/// provider would reject it. Values are replaced wholesale on refresh and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// Bearer token; callers must avoid logging it.
	pub token: Secret,
	/// Instant after which the credential must be exchanged again.
	pub expires_at: OffsetDateTime,
}
impl Credential {
	/// Creates a credential with an explicit effective expiry.
	pub fn new(token: impl Into<String>, expires_at: OffsetDateTime) -> Self {
		Self { token: Secret::new(token), expires_at }
	}

	/// Creates a credential issued at `now` whose lifetime is shortened by `safety_margin`.
	pub fn issue(
		token: impl Into<String>,
		now: OffsetDateTime,
		lifetime: Duration,
		safety_margin: Duration,
	) -> Self {
		let effective = time::Duration::try_from(lifetime.saturating_sub(safety_margin))
			.unwrap_or(time::Duration::MAX);

		Self::new(token, now.saturating_add(effective))
	}

	/// Returns `true` if the credential must be refreshed at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Returns `true` if the credential must be refreshed relative to the current clock.
	pub fn is_expired(&self) -> bool {
		self.is_expired_at(OffsetDateTime::now_utc())
	}

	/// Returns the raw bearer token for the `Authorization` header.
	pub fn bearer(&self) -> &str {
		self.token.expose()
	}
}

/// Token exchange failure shared with every caller waiting on the same refresh.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthFailure {
	/// Human-readable reason extracted from the provider response or transport.
	pub reason: String,
	/// HTTP status code, when the token endpoint answered.
	pub status: Option<u16>,
	/// Raw token endpoint payload, when one was received.
	pub payload: Option<Value>,
}
impl AuthFailure {
	/// Creates a failure without response details.
	pub fn new(reason: impl Into<String>) -> Self {
		Self { reason: reason.into(), status: None, payload: None }
	}

	/// Attaches the HTTP status code.
	pub fn with_status(mut self, status: Option<u16>) -> Self {
		self.status = status;

		self
	}

	/// Attaches the raw response payload.
	pub fn with_payload(mut self, payload: Option<Value>) -> Self {
		self.payload = payload;

		self
	}
}
impl From<AuthFailure> for Error {
	fn from(failure: AuthFailure) -> Self {
		Error::Authentication {
			reason: failure.reason,
			status: failure.status,
			payload: failure.payload,
		}
	}
}
