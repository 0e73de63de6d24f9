//! Authenticated, rate-limited API calls with bounded 429 retries.
//!
//! [`RequestOrchestrator::request`] obtains a bearer credential once, then for every attempt
//! waits for a quota slot, records the request, and sends it. 2xx bodies are decoded into the
//! caller's type; 429 responses are retried while the retry budget lasts, sleeping for the larger
//! of `Retry-After` and the exponential backoff; every other failure is classified and returned
//! on first occurrence.

mod classify;

// crates.io
use reqwest::{
	StatusCode,
	header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER},
};
// self
use crate::{
	_prelude::*,
	auth::{Credential, CredentialManager},
	config::ClientConfig,
	error::{ConfigError, TransportError},
	http::{self, ReqwestHttpClient},
	obs::{self, Outcome, RequestSpan, Stage},
	rate_limit::RateLimiter,
};

/// Ordered query parameters appended to a request URL.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query(Vec<(String, String)>);
impl Query {
	/// Creates an empty parameter list.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a parameter, returning the list for chaining.
	pub fn with(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.push(key, value);

		self
	}

	/// Appends a parameter in place.
	pub fn push(&mut self, key: impl Into<String>, value: impl Display) {
		self.0.push((key.into(), value.to_string()));
	}

	/// Appends every parameter from `other`.
	pub fn extend(&mut self, other: &Query) {
		self.0.extend(other.0.iter().cloned());
	}

	/// Returns the first value stored under `key`.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.iter().find(|(name, _)| name == key).map(|(_, value)| value.as_str())
	}

	/// Returns `true` if no parameters were added.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterates over the parameters in insertion order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
	}

	fn pairs(&self) -> &[(String, String)] {
		&self.0
	}
}
impl<K, V> FromIterator<(K, V)> for Query
where
	K: Into<String>,
	V: Display,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
	{
		let mut query = Query::new();

		for (key, value) in iter {
			query.push(key, value);
		}

		query
	}
}

/// Method, query, and optional JSON body for one API call.
#[derive(Clone, Debug)]
pub struct RequestOptions {
	/// HTTP method.
	pub method: Method,
	/// Query parameters.
	pub query: Query,
	/// JSON body, sent with `Content-Type: application/json` when present.
	pub body: Option<Value>,
}
impl RequestOptions {
	/// Creates options for the provided method with no query or body.
	pub fn new(method: Method) -> Self {
		Self { method, query: Query::new(), body: None }
	}

	/// `GET` options.
	pub fn get() -> Self {
		Self::new(Method::GET)
	}

	/// `POST` options.
	pub fn post() -> Self {
		Self::new(Method::POST)
	}

	/// `PUT` options.
	pub fn put() -> Self {
		Self::new(Method::PUT)
	}

	/// `DELETE` options.
	pub fn delete() -> Self {
		Self::new(Method::DELETE)
	}

	/// Appends one query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Display) -> Self {
		self.query.push(key, value);

		self
	}

	/// Appends every parameter from `query`.
	pub fn queries(mut self, query: &Query) -> Self {
		self.query.extend(query);

		self
	}

	/// Sets the JSON body.
	pub fn json(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}
}
impl Default for RequestOptions {
	fn default() -> Self {
		Self::get()
	}
}

/// Composes the credential manager and rate limiter around single API calls.
#[derive(Debug)]
pub struct RequestOrchestrator {
	http_client: ReqwestHttpClient,
	config: Arc<ClientConfig>,
	credentials: Arc<CredentialManager>,
	rate_limiter: Arc<RateLimiter>,
}
impl RequestOrchestrator {
	/// Wires an orchestrator from shared components.
	pub fn new(
		http_client: ReqwestHttpClient,
		config: Arc<ClientConfig>,
		credentials: Arc<CredentialManager>,
		rate_limiter: Arc<RateLimiter>,
	) -> Self {
		Self { http_client, config, credentials, rate_limiter }
	}

	/// Resolved configuration used for URL construction.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Credential manager shared with the client.
	pub fn credentials(&self) -> &Arc<CredentialManager> {
		&self.credentials
	}

	/// Rate limiter shared with the client.
	pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
		&self.rate_limiter
	}

	/// Sends `options` to `{base_url}/api{path}` and decodes the 2xx body into `T`.
	///
	/// An empty success body decodes as JSON `null`, so `()` and `Option<_>` targets accept it.
	/// Dropping the returned future abandons the in-flight call and any pending backoff.
	pub async fn request<T>(&self, path: &str, options: RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let span = RequestSpan::new(Stage::Request, options.method.as_str(), path);

		Stage::Request.record(Outcome::Attempt);

		let result = span.instrument(self.execute(path, &options)).await;

		match &result {
			Ok(_) => Stage::Request.record(Outcome::Success),
			Err(_) => Stage::Request.record(Outcome::Failure),
		}

		result
	}

	async fn execute<T>(&self, path: &str, options: &RequestOptions) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let url = self.config.api_url(path)?;
		let body = options
			.body
			.as_ref()
			.map(serde_json::to_vec)
			.transpose()
			.map_err(ConfigError::from)?;
		let credential = self.credentials.get_token().await?;
		let mut retry = RetryState::default();

		loop {
			self.rate_limiter.wait_for_slot().await;
			self.rate_limiter.record_request();

			let response = self
				.send(&url, options, body.as_deref(), &credential)
				.await
				.map_err(|err| TransportError::network(path, err))?;
			let status = response.status();
			let retry_after = response
				.headers()
				.get(RETRY_AFTER)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned);
			let bytes =
				response.bytes().await.map_err(|err| TransportError::network(path, err))?;

			if status.is_success() {
				return decode(path, status, &bytes);
			}
			if status != StatusCode::TOO_MANY_REQUESTS {
				return Err(classify::classify_failure(
					path,
					status.as_u16(),
					http::payload_from_body(&bytes),
				));
			}

			let retry_after = self.rate_limiter.parse_retry_after(retry_after.as_deref());

			if !self.rate_limiter.should_retry(retry.attempt) {
				return Err(Error::RateLimited {
					retry_after,
					payload: http::payload_from_body(&bytes),
				});
			}

			let delay = retry_after.max(self.rate_limiter.calculate_retry_delay(retry.attempt));

			obs::record_retry(path, retry.attempt, delay);
			tokio::time::sleep(delay).await;

			retry.attempt += 1;
		}
	}

	async fn send(
		&self,
		url: &Url,
		options: &RequestOptions,
		body: Option<&[u8]>,
		credential: &Credential,
	) -> Result<reqwest::Response, ReqwestError> {
		let mut builder = self
			.http_client
			.request(options.method.clone(), url.clone())
			.bearer_auth(credential.bearer())
			.header(ACCEPT, "application/json");

		if !options.query.is_empty() {
			builder = builder.query(options.query.pairs());
		}
		if let Some(body) = body {
			builder = builder.header(CONTENT_TYPE, "application/json").body(body.to_vec());
		}

		builder.send().await
	}
}

/// Retry bookkeeping for one logical call.
#[derive(Debug, Default)]
struct RetryState {
	attempt: u32,
}

fn decode<T>(path: &str, status: StatusCode, bytes: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let body = if bytes.iter().all(u8::is_ascii_whitespace) { b"null".as_slice() } else { bytes };
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer).map_err(|source| {
		TransportError::Decode { path: path.to_owned(), status: status.as_u16(), source }.into()
	})
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn query_preserves_insertion_order() {
		let query = Query::new().with("page_size", 50).with("open_only", true);

		assert_eq!(query.iter().collect::<Vec<_>>(), [("page_size", "50"), ("open_only", "true")]);
		assert_eq!(query.get("open_only"), Some("true"));

		let options = RequestOptions::get().queries(&query).query("count", true);

		assert_eq!(options.query.get("count"), Some("true"));
		assert_eq!(options.method, Method::GET);
	}

	#[test]
	fn empty_success_body_decodes_as_null() {
		let value: Option<Value> =
			decode("/Tickets/1", StatusCode::OK, b"").expect("Empty body should decode as null.");

		assert!(value.is_none());

		let () = decode("/Tickets/1", StatusCode::NO_CONTENT, b" ")
			.expect("Whitespace body should decode into unit.");
	}

	#[test]
	fn decode_errors_report_the_failing_field() {
		#[derive(Debug, Deserialize)]
		struct Ticket {
			#[allow(dead_code)]
			id: u64,
		}

		let err = decode::<Ticket>("/Tickets/1", StatusCode::OK, br#"{"id":"seven"}"#)
			.expect_err("Mismatched field types should fail to decode.");
		let Error::Transport(TransportError::Decode { path, status, source }) = err else {
			panic!("Expected a decode error.");
		};

		assert_eq!(path, "/Tickets/1");
		assert_eq!(status, 200);
		assert_eq!(source.path().to_string(), "id");
	}
}
