//! Client-credentials exchange backed by the `oauth2` crate.

// crates.io
use oauth2::{
	AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet, HttpClientError,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{AuthFailure, Credential},
	config::ClientConfig,
	error::ConfigError,
	http::{self, ReqwestHttpClient, ResponseMetadata, ResponseMetadataSlot},
};

type ConfiguredBasicClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Performs `grant_type=client_credentials` exchanges against `{base_url}/auth/token`.
///
/// Client credentials travel in the form body alongside `scope` and, when configured,
/// `tenant_id`.
pub(crate) struct TokenExchange {
	oauth_client: ConfiguredBasicClient,
	http_client: ReqwestHttpClient,
	scope: String,
	tenant_id: Option<String>,
	safety_margin: Duration,
}
impl TokenExchange {
	pub(crate) fn new(
		config: &ClientConfig,
		http_client: ReqwestHttpClient,
	) -> Result<Self, ConfigError> {
		let token_url = TokenUrl::new(config.token_url())
			.map_err(|source| ConfigError::InvalidBaseUrl { url: config.base_url.clone(), source })?;
		let oauth_client = BasicClient::new(ClientId::new(config.client_id.clone()))
			.set_client_secret(ClientSecret::new(config.client_secret.expose().to_owned()))
			.set_token_uri(token_url)
			.set_auth_type(AuthType::RequestBody);

		Ok(Self {
			oauth_client,
			http_client,
			scope: config.scope.clone(),
			tenant_id: config.tenant_id.clone(),
			safety_margin: config.token_safety_margin,
		})
	}

	/// Exchanges the client credentials for a new bearer credential.
	pub(crate) async fn exchange(&self) -> Result<Credential, AuthFailure> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.instrumented(meta.clone());
		let mut request = self
			.oauth_client
			.exchange_client_credentials()
			.add_scope(Scope::new(self.scope.clone()));

		if let Some(tenant_id) = &self.tenant_id {
			request = request.add_extra_param("tenant_id", tenant_id.clone());
		}

		let response = request
			.request_async(&instrumented)
			.await
			.map_err(|err| map_request_error(meta.take(), err))?;
		let status = meta.take().and_then(|value| value.status);
		let lifetime = response.expires_in().filter(|lifetime| !lifetime.is_zero()).ok_or_else(
			|| {
				AuthFailure::new("Token response did not include a positive expires_in")
					.with_status(status)
			},
		)?;

		Ok(Credential::issue(
			response.access_token().secret().to_owned(),
			OffsetDateTime::now_utc(),
			lifetime,
			self.safety_margin,
		))
	}
}

fn map_request_error(
	meta: Option<ResponseMetadata>,
	err: BasicRequestTokenError<HttpClientError<ReqwestError>>,
) -> AuthFailure {
	let status = meta.and_then(|value| value.status);

	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(status, response),
		RequestTokenError::Request(error) =>
			AuthFailure::new(format!("Token endpoint could not be reached: {error}"))
				.with_status(status),
		RequestTokenError::Parse(error, body) =>
			AuthFailure::new(format!("Token endpoint returned an unreadable response: {error}"))
				.with_status(status)
				.with_payload(http::payload_from_body(&body)),
		RequestTokenError::Other(message) =>
			AuthFailure::new(format!("Token endpoint returned an unexpected response: {message}"))
				.with_status(status),
	}
}

fn map_server_response_error(status: Option<u16>, response: BasicErrorResponse) -> AuthFailure {
	let reason = match response.error_description() {
		Some(description) => description.clone(),
		None => response.error().as_ref().to_owned(),
	};

	AuthFailure::new(reason).with_status(status).with_payload(serde_json::to_value(&response).ok())
}
