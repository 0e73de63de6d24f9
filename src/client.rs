//! Client facade owning one credential manager, rate limiter, and orchestrator.

// self
use crate::{
	_prelude::*,
	auth::CredentialManager,
	config::ClientConfig,
	error::ConfigError,
	http::ReqwestHttpClient,
	pagination::PagedSequence,
	rate_limit::{RateLimitStatus, RateLimiter},
	request::{RequestOptions, RequestOrchestrator},
	resource::{Resource, ResourceDescriptor},
};

/// Entry point for API calls.
///
/// Cloning is cheap; clones share the cached credential and the usage window, so every clone
/// counts against the same quota.
#[derive(Clone, Debug)]
pub struct HaloClient {
	orchestrator: Arc<RequestOrchestrator>,
}
impl HaloClient {
	/// Creates a client with a default reqwest transport that does not follow redirects.
	pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
		let http_client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.map_err(ConfigError::http_client_build)?;

		Self::with_http_client(config, ReqwestHttpClient::with_client(http_client))
	}

	/// Creates a client that reuses the caller-provided transport.
	pub fn with_http_client(
		config: ClientConfig,
		http_client: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone())?);
		let credentials = Arc::new(CredentialManager::new(&config, http_client.clone())?);
		let orchestrator = RequestOrchestrator::new(
			http_client,
			Arc::new(config),
			credentials,
			rate_limiter,
		);

		Ok(Self { orchestrator: Arc::new(orchestrator) })
	}

	/// Resolved configuration.
	pub fn config(&self) -> &ClientConfig {
		self.orchestrator.config()
	}

	/// Sends one authenticated call to `{base_url}/api{path}`.
	pub async fn request<T>(&self, path: &str, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		self.orchestrator.request(path, options).await
	}

	/// Lazy traversal of a list endpoint whose items live under `items_key`.
	pub fn paged<T>(&self, path: impl Into<String>, items_key: impl Into<String>) -> PagedSequence<T>
	where
		T: DeserializeOwned,
	{
		PagedSequence::new(Arc::clone(&self.orchestrator), path, items_key)
	}

	/// CRUD handle for one resource collection.
	pub fn resource(&self, descriptor: ResourceDescriptor) -> Resource {
		Resource::new(Arc::clone(&self.orchestrator), descriptor)
	}

	/// Tickets collection.
	pub fn tickets(&self) -> Resource {
		self.resource(ResourceDescriptor::TICKETS)
	}

	/// Clients (customer companies) collection.
	pub fn clients(&self) -> Resource {
		self.resource(ResourceDescriptor::CLIENTS)
	}

	/// Forces the next call to exchange a new bearer credential.
	pub fn invalidate_token(&self) {
		self.orchestrator.credentials().invalidate();
	}

	/// Current quota usage.
	pub fn rate_limit_status(&self) -> RateLimitStatus {
		self.orchestrator.rate_limiter().status()
	}

	/// Shared credential manager.
	pub fn credentials(&self) -> &Arc<CredentialManager> {
		self.orchestrator.credentials()
	}

	/// Shared rate limiter.
	pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
		self.orchestrator.rate_limiter()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::config::RateLimitConfig;

	#[test]
	fn fresh_clients_report_full_quota() {
		let config = ClientConfig::builder("id", "secret")
			.tenant("acme")
			.build()
			.expect("Failed to build client configuration.");
		let client = HaloClient::new(config).expect("Failed to build client.");
		let status = client.rate_limit_status();

		assert_eq!(status.remaining, RateLimitConfig::default().max_requests);
		assert_eq!(status.rate, 0.);
		assert_eq!(client.config().base_url, "https://acme.halopsa.com");
		assert!(client.credentials().cached().is_none());
		assert_eq!(client.tickets().descriptor(), ResourceDescriptor::TICKETS);
	}

	#[test]
	fn hand_built_configs_with_bad_limits_are_rejected() {
		let mut config = ClientConfig::builder("id", "secret")
			.tenant("acme")
			.build()
			.expect("Failed to build client configuration.");

		config.rate_limit.max_requests = 0;

		assert!(matches!(
			HaloClient::with_http_client(config.clone(), ReqwestHttpClient::default()),
			Err(ConfigError::ZeroMaxRequests)
		));

		config.rate_limit = RateLimitConfig { throttle_threshold: 0., ..Default::default() };

		assert!(matches!(
			HaloClient::new(config),
			Err(ConfigError::InvalidThrottleThreshold { .. })
		));
	}

	#[test]
	fn clones_share_pipeline_state() {
		let client = crate::_preludet::build_test_client("http://127.0.0.1:9");
		let clone = client.clone();

		assert!(Arc::ptr_eq(client.rate_limiter(), clone.rate_limiter()));
		assert!(Arc::ptr_eq(client.credentials(), clone.credentials()));
	}
}
