//! Transport primitives for session requests.
//!
//! [`SessionTransport`] is the client's only dependency on an HTTP stack. Requests are plain
//! values ([`ApiRequest`]) so the interceptor can replay them after a refresh, and responses
//! arrive fully buffered ([`ApiResponse`]) so status handling never races the body stream.
//! The transport also owns the cookie jar that carries the refresh cookie, which is why
//! cookie expiry lives on this trait.

// std
use std::time::Duration as StdDuration;
// crates.io
use ::http::{
	HeaderMap, HeaderName, HeaderValue, Method, StatusCode,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use bytes::Bytes;
#[cfg(feature = "reqwest")] use reqwest::cookie::Jar;
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	error::{ConfigError, StatusError, TransportError},
};
#[cfg(feature = "reqwest")] use crate::config::SessionConfig;

/// Boxed future returned by [`SessionTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// HTTP transport used for API calls and the refresh call.
///
/// Implementations must not follow the interceptor themselves; the session client decides
/// when a request is authorized, refreshed, or replayed. They must send cookies stored for
/// the request URL, since the refresh endpoint authenticates through its own cookie.
pub trait SessionTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and buffers the full response, whatever its status.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;

	/// Best-effort expiry of cookie `name` at `path`. The default does nothing.
	fn expire_cookie(&self, name: &str, path: &str) {
		let _ = (name, path);
	}
}

/// Replayable HTTP request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Buffered body.
	pub body: Option<Bytes>,
	/// Per-request timeout; the client fills in its default when unset.
	pub timeout: Option<StdDuration>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None, timeout: None }
	}

	/// Appends a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body.
	pub fn json<T>(mut self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(Bytes::from(serde_json::to_vec(value)?));
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Overrides the timeout for this request.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Token currently attached as `Authorization: Bearer`, if any.
	pub fn bearer_token(&self) -> Option<&str> {
		self.headers.get(AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
	}

	/// Replaces the `Authorization` header with `token`.
	pub fn set_bearer(&mut self, token: &AccessToken) -> Result<(), ConfigError> {
		let mut value = HeaderValue::from_str(&token.bearer())?;

		value.set_sensitive(true);
		self.headers.insert(AUTHORIZATION, value);

		Ok(())
	}
}

/// Fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// Final request URL.
	pub url: Url,
	/// HTTP status.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Bytes,
}
impl ApiResponse {
	/// Creates a response for `url` with an empty header map.
	pub fn new(url: Url, status: StatusCode, body: impl Into<Bytes>) -> Self {
		Self { url, status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Converts non-2xx answers into [`StatusError`].
	pub fn error_for_status(self) -> Result<Self, StatusError> {
		if self.is_success() {
			Ok(self)
		} else {
			Err(StatusError::new(self.status.as_u16(), self.url.as_str(), &self.body))
		}
	}

	/// Decodes the body as JSON, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::Decode { url: self.url.to_string(), source })
	}
}

/// reqwest-backed transport with a shared cookie jar.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	jar: Arc<Jar>,
	cookie_url: Url,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client with a fresh cookie jar scoped to the configured API base.
	pub fn new(config: &SessionConfig) -> Result<Self, ConfigError> {
		let jar = Arc::new(Jar::default());
		let client = ReqwestClient::builder().cookie_provider(jar.clone()).build()?;

		Ok(Self::with_client(client, jar, config.api_base.clone()))
	}

	/// Wraps an existing client; `jar` must be the cookie provider `client` was built with.
	pub fn with_client(client: ReqwestClient, jar: Arc<Jar>, cookie_url: Url) -> Self {
		Self { client, jar, cookie_url }
	}

	/// Cookie jar shared with the underlying client.
	pub fn cookie_jar(&self) -> &Arc<Jar> {
		&self.jar
	}
}
#[cfg(feature = "reqwest")]
impl SessionTransport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let url = request.url.to_string();
			let mut builder =
				self.client.request(request.method, request.url).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}
			if let Some(timeout) = request.timeout {
				builder = builder.timeout(timeout);
			}

			let map_err = |e: ReqwestError| {
				if e.is_timeout() {
					TransportError::Timeout { url: url.clone() }
				} else {
					TransportError::network(url.clone(), e)
				}
			};
			let response = builder.send().await.map_err(map_err)?;
			let final_url = response.url().clone();
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await.map_err(map_err)?;

			Ok(ApiResponse { url: final_url, status, headers, body })
		})
	}

	fn expire_cookie(&self, name: &str, path: &str) {
		self.jar.add_cookie_str(
			&format!("{name}=; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT; Path={path}"),
			&self.cookie_url,
		);
	}
}
