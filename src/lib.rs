//! Typed HaloPSA client core: single-flight OAuth credentials, a rolling-window rate limiter,
//! bounded 429 backoff, a typed error taxonomy, and lazy paginated streams.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod obs;
pub mod pagination;
pub mod rate_limit;
pub mod request;
pub mod resource;

mod oauth;

pub use client::HaloClient;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::HaloClient,
		config::{ClientConfig, RateLimitConfig},
		http::ReqwestHttpClient,
	};

	/// Client id used by every test configuration.
	pub const TEST_CLIENT_ID: &str = "test-client-id";
	/// Client secret used by every test configuration.
	pub const TEST_CLIENT_SECRET: &str = "test-client-secret";
	/// Bearer token issued by mock token endpoints.
	pub const TEST_TOKEN: &str = "mock-jwt-token-for-testing";

	/// Rate-limit settings that keep tests fast: a generous quota and millisecond backoff.
	pub fn fast_rate_limit() -> RateLimitConfig {
		RateLimitConfig {
			max_requests: 100,
			window: Duration::from_secs(60),
			retry_after: Duration::from_millis(10),
			..RateLimitConfig::default()
		}
	}

	/// Builds a configuration pointing at a mock server's base URL.
	pub fn test_config(base_url: &str, rate_limit: RateLimitConfig) -> ClientConfig {
		ClientConfig::builder(TEST_CLIENT_ID, TEST_CLIENT_SECRET)
			.base_url(base_url)
			.rate_limit(rate_limit)
			.build()
			.expect("Failed to build test client configuration.")
	}

	/// Constructs a [`HaloClient`] against `base_url` using [`fast_rate_limit`].
	pub fn build_test_client(base_url: &str) -> HaloClient {
		build_test_client_with(base_url, fast_rate_limit())
	}

	/// Constructs a [`HaloClient`] against `base_url` with explicit rate-limit settings.
	pub fn build_test_client_with(base_url: &str, rate_limit: RateLimitConfig) -> HaloClient {
		build_test_client_over(base_url, rate_limit, ReqwestHttpClient::default())
	}

	/// Constructs a [`HaloClient`] that sends through a caller-supplied transport.
	pub fn build_test_client_over(
		base_url: &str,
		rate_limit: RateLimitConfig,
		http_client: ReqwestHttpClient,
	) -> HaloClient {
		HaloClient::with_http_client(test_config(base_url, rate_limit), http_client)
			.expect("Failed to build test client.")
	}

	/// JSON body returned by mock token endpoints.
	pub fn token_body(token: &str, expires_in: u64) -> String {
		format!(
			"{{\"access_token\":\"{token}\",\"token_type\":\"Bearer\",\"expires_in\":{expires_in},\"scope\":\"all\"}}"
		)
	}
}

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		marker::PhantomData,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::Mutex;
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError, Method};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
