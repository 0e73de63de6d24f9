//! Cached client-credentials token with single-flight refresh.
//!
//! [`CredentialManager::get_token`] serves the cached [`Credential`] while it is fresh and
//! otherwise performs exactly one exchange no matter how many callers arrive concurrently.
//! Callers that queued behind a refresh observe its outcome: they reuse the new credential, or
//! they all fail with the same [`AuthFailure`] and nothing is cached.

// self
use crate::{
	_prelude::*,
	auth::{AuthFailure, Credential},
	config::ClientConfig,
	error::ConfigError,
	http::ReqwestHttpClient,
	oauth::TokenExchange,
	obs::{Outcome, RequestSpan, Stage},
};

/// Owns the bearer credential for one client instance.
pub struct CredentialManager {
	exchange: TokenExchange,
	state: Mutex<CacheState>,
	refresh_guard: AsyncMutex<()>,
}
impl CredentialManager {
	/// Creates a manager exchanging against `{base_url}/auth/token`.
	pub fn new(config: &ClientConfig, http_client: ReqwestHttpClient) -> Result<Self, ConfigError> {
		Ok(Self {
			exchange: TokenExchange::new(config, http_client)?,
			state: Mutex::new(CacheState::default()),
			refresh_guard: AsyncMutex::new(()),
		})
	}

	/// Returns a fresh credential, exchanging client credentials when the cache is empty or
	/// expired.
	pub async fn get_token(&self) -> Result<Credential> {
		let observed = {
			let state = self.state.lock();

			if let Some(credential) = state.fresh(OffsetDateTime::now_utc()) {
				return Ok(credential);
			}

			state.stats.completed()
		};
		let _singleflight = self.refresh_guard.lock().await;

		{
			let state = self.state.lock();

			if let Some(credential) = state.fresh(OffsetDateTime::now_utc()) {
				return Ok(credential);
			}
			// A refresh finished while this caller was queued; share its failure.
			if let (true, Some(failure)) = (state.stats.completed() != observed, &state.failure) {
				return Err(failure.clone().into());
			}
		}

		self.refresh().await
	}

	/// Drops the cached credential so the next [`get_token`](Self::get_token) exchanges again.
	pub fn invalidate(&self) {
		let mut state = self.state.lock();

		state.credential = None;
		state.failure = None;
	}

	/// Returns the cached credential without refreshing, even if it is expired.
	pub fn cached(&self) -> Option<Credential> {
		self.state.lock().credential.clone()
	}

	/// Snapshot of the exchange counters.
	pub fn stats(&self) -> ExchangeStats {
		self.state.lock().stats
	}

	async fn refresh(&self) -> Result<Credential> {
		let span = RequestSpan::new(Stage::TokenExchange, "POST", "/auth/token");

		self.state.lock().stats.attempts += 1;
		Stage::TokenExchange.record(Outcome::Attempt);

		let outcome = span.instrument(self.exchange.exchange()).await;
		let mut state = self.state.lock();

		match outcome {
			Ok(credential) => {
				Stage::TokenExchange.record(Outcome::Success);

				state.stats.successes += 1;
				state.credential = Some(credential.clone());
				state.failure = None;

				Ok(credential)
			},
			Err(failure) => {
				Stage::TokenExchange.record(Outcome::Failure);

				state.stats.failures += 1;
				state.credential = None;
				state.failure = Some(failure.clone());

				Err(failure.into())
			},
		}
	}
}
impl Debug for CredentialManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("CredentialManager")
			.field("cached", &state.credential)
			.field("stats", &state.stats)
			.finish_non_exhaustive()
	}
}

/// Token exchange counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExchangeStats {
	/// Exchanges sent to the token endpoint.
	pub attempts: u64,
	/// Exchanges that produced a credential.
	pub successes: u64,
	/// Exchanges that failed.
	pub failures: u64,
}
impl ExchangeStats {
	/// Exchanges that have finished either way.
	pub fn completed(&self) -> u64 {
		self.successes + self.failures
	}
}

#[derive(Debug, Default)]
struct CacheState {
	credential: Option<Credential>,
	failure: Option<AuthFailure>,
	// Queued callers compare `completed()` to tell whether a refresh finished while they waited.
	stats: ExchangeStats,
}
impl CacheState {
	fn fresh(&self, now: OffsetDateTime) -> Option<Credential> {
		self.credential.as_ref().filter(|credential| !credential.is_expired_at(now)).cloned()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::{_preludet::*, error::ErrorKind};

	fn manager_for(config: &ClientConfig) -> CredentialManager {
		CredentialManager::new(config, ReqwestHttpClient::default())
			.expect("Failed to build credential manager.")
	}

	fn manager(server: &MockServer) -> CredentialManager {
		manager_for(&test_config(&server.base_url(), fast_rate_limit()))
	}

	async fn mock_token(server: &MockServer, expires_in: u64) -> httpmock::Mock<'_> {
		server
			.mock_async(|when, then| {
				when.method(POST).path("/auth/token");
				then.status(200)
					.header("content-type", "application/json")
					.body(token_body(TEST_TOKEN, expires_in));
			})
			.await
	}

	#[tokio::test]
	async fn caches_token_until_expiry() {
		let server = MockServer::start_async().await;
		let mock = mock_token(&server, 360_000).await;
		let manager = manager(&server);
		let first = manager.get_token().await.expect("Initial exchange should succeed.");
		let second = manager.get_token().await.expect("Cached token should be returned.");

		assert_eq!(first.bearer(), TEST_TOKEN);
		assert_eq!(first, second);
		assert!(!first.is_expired());
		assert_eq!(manager.stats(), ExchangeStats { attempts: 1, successes: 1, failures: 0 });

		mock.assert_calls_async(1).await;
	}

	#[tokio::test]
	async fn invalidate_forces_exactly_one_new_exchange() {
		let server = MockServer::start_async().await;
		let mock = mock_token(&server, 360_000).await;
		let manager = manager(&server);

		manager.get_token().await.expect("Initial exchange should succeed.");
		manager.invalidate();

		assert!(manager.cached().is_none());

		manager.get_token().await.expect("Exchange after invalidation should succeed.");
		manager.get_token().await.expect("Cached token should be returned.");

		mock.assert_calls_async(2).await;
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_exchange() {
		let server = MockServer::start_async().await;
		let mock = mock_token(&server, 360_000).await;
		let manager = manager(&server);
		let (first, second, third) =
			tokio::join!(manager.get_token(), manager.get_token(), manager.get_token());

		for credential in [first, second, third] {
			assert_eq!(
				credential.expect("Every concurrent caller should succeed.").bearer(),
				TEST_TOKEN
			);
		}

		mock.assert_calls_async(1).await;
	}

	#[tokio::test]
	async fn rejected_credentials_surface_as_authentication() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/auth/token");
				then.status(400)
					.header("content-type", "application/json")
					.body(r#"{"error":"invalid_client","error_description":"Bad credentials"}"#);
			})
			.await;
		let manager = manager(&server);
		let err = manager.get_token().await.expect_err("Bad credentials should fail.");

		assert_eq!(err.kind(), ErrorKind::Authentication);
		assert_eq!(err.status(), Some(400));
		assert_eq!(err.to_string(), "Authentication failed: Bad credentials.");
		assert_eq!(
			err.payload().and_then(|payload| payload.get("error")).and_then(Value::as_str),
			Some("invalid_client")
		);
		assert!(manager.cached().is_none(), "Failed exchanges must not cache anything.");
		assert_eq!(manager.stats().failures, 1);

		mock.assert_calls_async(1).await;
	}

	#[tokio::test]
	async fn concurrent_callers_share_one_failure() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/auth/token");
				then.status(401)
					.header("content-type", "application/json")
					.body(r#"{"error":"invalid_client"}"#);
			})
			.await;
		let manager = manager(&server);
		let (first, second) = tokio::join!(manager.get_token(), manager.get_token());

		for result in [first, second] {
			let err = result.expect_err("Every waiter should observe the failure.");

			assert_eq!(err.kind(), ErrorKind::Authentication);
			assert_eq!(err.status(), Some(401));
		}

		mock.assert_calls_async(1).await;

		// The next call after a failed refresh tries again.
		manager.get_token().await.expect_err("The endpoint still rejects the client.");

		mock.assert_calls_async(2).await;
	}

	#[tokio::test]
	async fn exchange_posts_client_credentials_form() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/auth/token")
					.header("content-type", "application/x-www-form-urlencoded")
					.form_urlencoded_tuple("grant_type", "client_credentials")
					.form_urlencoded_tuple("client_id", TEST_CLIENT_ID)
					.form_urlencoded_tuple("client_secret", TEST_CLIENT_SECRET)
					.form_urlencoded_tuple("scope", "edit:tickets")
					.form_urlencoded_tuple("tenant_id", "tenant-42");
				then.status(200)
					.header("content-type", "application/json")
					.body(token_body(TEST_TOKEN, 3_600));
			})
			.await;
		let config = ClientConfig::builder(TEST_CLIENT_ID, TEST_CLIENT_SECRET)
			.base_url(server.base_url())
			.scope("edit:tickets")
			.tenant_id("tenant-42")
			.build()
			.expect("Failed to build client configuration.");
		let manager = manager_for(&config);

		manager.get_token().await.expect("Form-encoded exchange should succeed.");

		mock.assert_calls_async(1).await;
	}

	#[tokio::test]
	async fn lifetimes_inside_the_safety_margin_refresh_every_call() {
		let server = MockServer::start_async().await;
		let mock = mock_token(&server, 30).await;
		let manager = manager(&server);

		manager.get_token().await.expect("First exchange should succeed.");
		manager.get_token().await.expect("Second exchange should succeed.");

		mock.assert_calls_async(2).await;
	}

	#[tokio::test]
	async fn unreadable_token_responses_keep_status_and_body() {
		let server = MockServer::start_async().await;
		let mock = server
			.mock_async(|when, then| {
				when.method(POST).path("/auth/token");
				then.status(502).header("content-type", "text/html").body("<html>Bad Gateway</html>");
			})
			.await;
		let manager = manager(&server);
		let err = manager.get_token().await.expect_err("Gateway errors should fail the exchange.");

		assert_eq!(err.kind(), ErrorKind::Authentication);
		assert_eq!(err.status(), Some(502));
		assert_eq!(err.payload(), Some(&Value::String("<html>Bad Gateway</html>".into())));

		mock.assert_calls_async(1).await;
	}

	#[tokio::test]
	async fn unreachable_token_endpoint_is_authentication_without_status() {
		let manager = manager_for(&test_config("http://127.0.0.1:1", fast_rate_limit()));
		let err = manager.get_token().await.expect_err("Connection failures should surface.");

		assert_eq!(err.kind(), ErrorKind::Authentication);
		assert_eq!(err.status(), None);
	}
}
