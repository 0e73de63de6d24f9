//! Resolved client configuration and rate-limit settings.

mod builder;

pub use builder::*;

// crates.io
use serde::{Deserializer, Serializer};
// self
use crate::{_prelude::*, auth::Secret, error::ConfigError};

/// Fully resolved client configuration; every default has been applied.
///
/// Build values through [`ClientConfig::builder`] so URL normalization and rate-limit validation
/// run exactly once.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret (redacted in `Debug`).
	pub client_secret: Secret,
	/// API origin without a trailing slash, e.g. `https://acme.halopsa.com`.
	pub base_url: String,
	/// Optional tenant identifier forwarded to the token endpoint for multi-tenant apps.
	pub tenant_id: Option<String>,
	/// OAuth scope requested during the exchange.
	pub scope: String,
	/// Rolling quota and retry settings.
	pub rate_limit: RateLimitConfig,
	/// Amount subtracted from the provider-reported lifetime so tokens are refreshed early.
	pub token_safety_margin: Duration,
}
impl ClientConfig {
	/// Scope requested when none is configured.
	pub const DEFAULT_SCOPE: &'static str = "all";
	/// Default early-refresh margin applied to every credential.
	pub const DEFAULT_TOKEN_SAFETY_MARGIN: Duration = Duration::from_secs(60);

	/// Creates a builder seeded with the mandatory client credentials.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> ClientConfigBuilder {
		ClientConfigBuilder::new(client_id, client_secret)
	}

	/// Token endpoint: `{base_url}/auth/token`.
	pub fn token_url(&self) -> String {
		format!("{}/auth/token", self.base_url)
	}

	/// Resolves an API path such as `/Tickets/12` against `{base_url}/api`.
	pub fn api_url(&self, path: &str) -> Result<Url, ConfigError> {
		let raw = if path.starts_with('/') {
			format!("{}/api{path}", self.base_url)
		} else {
			format!("{}/api/{path}", self.base_url)
		};

		Url::parse(&raw).map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}
}

/// Rolling quota, throttling, and 429 retry settings.
///
/// Deserializes from partial documents; missing fields fall back to the defaults and durations
/// are expressed in milliseconds (`window_ms`, `retry_after_ms`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
	/// Disables all admission control and usage tracking when false.
	pub enabled: bool,
	/// Requests permitted per rolling window.
	pub max_requests: u32,
	/// Rolling window length.
	#[serde(rename = "window_ms", with = "duration_ms")]
	pub window: Duration,
	/// Usage fraction in `(0, 1]` at which callers start waiting for a slot.
	pub throttle_threshold: f64,
	/// Base 429 backoff delay and fallback when `Retry-After` is unusable.
	#[serde(rename = "retry_after_ms", with = "duration_ms")]
	pub retry_after: Duration,
	/// Maximum retries after the first 429 response.
	pub max_retries: u32,
}
impl RateLimitConfig {
	/// Checks the invariants the limiter relies on.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let threshold_in_range = self.throttle_threshold > 0. && self.throttle_threshold <= 1.;

		if !threshold_in_range {
			return Err(ConfigError::InvalidThrottleThreshold { value: self.throttle_threshold });
		}
		if self.enabled {
			if self.max_requests == 0 {
				return Err(ConfigError::ZeroMaxRequests);
			}
			if self.window.is_zero() {
				return Err(ConfigError::ZeroWindow);
			}
		}

		Ok(())
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			max_requests: 500,
			window: Duration::from_secs(180),
			throttle_threshold: 0.8,
			retry_after: Duration::from_secs(5),
			max_retries: 3,
		}
	}
}

mod duration_ms {
	// self
	use super::*;

	pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
