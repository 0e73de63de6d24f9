// self
use crate::{
	_prelude::*,
	auth::Secret,
	config::{ClientConfig, RateLimitConfig},
	error::ConfigError,
};

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret.
	pub client_secret: Secret,
	/// Tenant name expanded to `https://{tenant}.halopsa.com`.
	pub tenant: Option<String>,
	/// Explicit API origin; wins over `tenant` when both are set.
	pub base_url: Option<String>,
	/// Optional tenant identifier forwarded to the token endpoint.
	pub tenant_id: Option<String>,
	/// Optional scope override.
	pub scope: Option<String>,
	/// Rate-limit settings.
	pub rate_limit: RateLimitConfig,
	/// Early-refresh margin.
	pub token_safety_margin: Duration,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the client credentials.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret: Secret::new(client_secret),
			tenant: None,
			base_url: None,
			tenant_id: None,
			scope: None,
			rate_limit: RateLimitConfig::default(),
			token_safety_margin: ClientConfig::DEFAULT_TOKEN_SAFETY_MARGIN,
		}
	}

	/// Sets the tenant name used to derive the hosted base URL.
	pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Sets an explicit API origin (self-hosted instances, mock servers).
	pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = Some(base_url.into());

		self
	}

	/// Sets the tenant identifier forwarded during the token exchange.
	pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
		self.tenant_id = Some(tenant_id.into());

		self
	}

	/// Overrides the requested OAuth scope.
	pub fn scope(mut self, scope: impl Into<String>) -> Self {
		self.scope = Some(scope.into());

		self
	}

	/// Overrides the rate-limit settings.
	pub fn rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
		self.rate_limit = rate_limit;

		self
	}

	/// Overrides the early-refresh margin (defaults to 60 seconds).
	pub fn token_safety_margin(mut self, margin: Duration) -> Self {
		self.token_safety_margin = margin;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::EmptyClientId);
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::EmptyClientSecret);
		}

		let base_url = resolve_base_url(self.base_url.as_deref(), self.tenant.as_deref())?;

		self.rate_limit.validate()?;

		Ok(ClientConfig {
			client_id: self.client_id,
			client_secret: self.client_secret,
			base_url,
			tenant_id: self.tenant_id.filter(|id| !id.is_empty()),
			scope: self.scope.unwrap_or_else(|| ClientConfig::DEFAULT_SCOPE.into()),
			rate_limit: self.rate_limit,
			token_safety_margin: self.token_safety_margin,
		})
	}
}

fn resolve_base_url(base_url: Option<&str>, tenant: Option<&str>) -> Result<String, ConfigError> {
	let raw = match (base_url.filter(|url| !url.is_empty()), tenant.filter(|t| !t.is_empty())) {
		(Some(url), _) => url.trim_end_matches('/').to_owned(),
		(None, Some(tenant)) => format!("https://{tenant}.halopsa.com"),
		(None, None) => return Err(ConfigError::MissingBaseUrl),
	};
	let parsed =
		Url::parse(&raw).map_err(|source| ConfigError::InvalidBaseUrl { url: raw.clone(), source })?;

	match parsed.scheme() {
		"http" | "https" => Ok(raw),
		scheme => Err(ConfigError::UnsupportedScheme { scheme: scheme.to_owned() }),
	}
}
