//! Session client: the bearer-token interceptor pair over a pluggable transport.
//!
//! A [`SessionClient`] owns every piece of per-session mutable state (token holder,
//! single-flight refresh queue, bootstrap gate) so independent clients never share a
//! session. Clones are cheap and share state, which is how concurrent tasks cooperate on a
//! single refresh.

pub mod bootstrap;
pub mod interceptor;
pub mod refresh;

pub use refresh::{RefreshMetrics, RefreshQueue};

// crates.io
use ::http::Method;
use futures::future::{BoxFuture, Shared};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, JwtPayload, TokenHolder},
	config::SessionConfig,
	http::{ApiRequest, ApiResponse, SessionTransport},
	nav::Navigator,
	obs::{self, FlowKind},
	store::{HintStorage, SessionHint},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Shareable bootstrap future; resolves to whether a session is established.
pub type BootstrapFuture = Shared<BoxFuture<'static, bool>>;

#[cfg(feature = "reqwest")]
/// Session client specialized for the crate's default reqwest transport.
pub type ReqwestSessionClient = SessionClient<ReqwestTransport>;

/// Authenticated API client with transparent, single-flight session refresh.
pub struct SessionClient<T>
where
	T: SessionTransport,
{
	/// Validated routes, names, and timeouts.
	pub config: Arc<SessionConfig>,
	/// Transport used for API calls and the refresh call.
	pub transport: Arc<T>,
	/// In-memory bearer token and its listeners.
	pub tokens: Arc<TokenHolder>,
	/// Persisted "had a session" flag.
	pub hint: SessionHint,
	/// Host navigation hook used for login redirects.
	pub navigator: Arc<dyn Navigator>,
	/// Counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	refresh: Arc<RefreshQueue>,
	bootstrap: Arc<Mutex<Option<BootstrapFuture>>>,
}
impl<T> SessionClient<T>
where
	T: SessionTransport,
{
	/// Creates a client over the caller-provided transport and ports.
	pub fn with_transport(
		config: SessionConfig,
		transport: impl Into<Arc<T>>,
		storage: Arc<dyn HintStorage>,
		navigator: Arc<dyn Navigator>,
	) -> Self {
		let hint = SessionHint::new(storage, config.hint_key.clone());

		Self {
			config: Arc::new(config),
			transport: transport.into(),
			tokens: Default::default(),
			hint,
			navigator,
			refresh_metrics: Default::default(),
			refresh: Default::default(),
			bootstrap: Default::default(),
		}
	}

	/// Returns the current access token.
	pub fn access_token(&self) -> Option<AccessToken> {
		self.tokens.get_access_token()
	}

	/// Decodes the current token into the signed-in user's claims.
	pub fn current_user(&self) -> Option<JwtPayload> {
		self.tokens.payload()
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.refresh.is_refreshing()
	}

	/// Number of callers parked behind the in-flight refresh.
	pub fn pending_refresh_subscribers(&self) -> usize {
		self.refresh.pending()
	}

	/// Installs a token obtained from a login response and marks the session hint.
	pub fn establish_session(&self, token: AccessToken) {
		self.tokens.set_access_token(token);
		self.hint.mark_auth_session_hint();
	}

	/// Definitive logout: drops the token, expires refresh cookies, and clears the hint.
	pub fn end_session(&self) {
		obs::record_event(FlowKind::Request, "Ending session.");

		self.clear_local_session();
	}

	/// Builds a request for `path`, resolved against the API base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<ApiRequest> {
		Ok(ApiRequest::new(method, self.config.endpoint(path)?))
	}

	/// Sends `GET path`.
	pub async fn get(&self, path: &str) -> Result<ApiResponse> {
		self.send(self.request(Method::GET, path)?).await
	}

	/// Sends `GET path` and decodes the JSON body.
	pub async fn get_json<R>(&self, path: &str) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.get(path).await?.json()
	}

	/// Sends `POST path` with a JSON body and decodes the JSON answer.
	pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
	where
		B: ?Sized + Serialize,
		R: for<'de> Deserialize<'de>,
	{
		let request = self.request(Method::POST, path)?.json(body)?;

		self.send(request).await?.json()
	}

	/// Sends `DELETE path`.
	pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
		self.send(self.request(Method::DELETE, path)?).await
	}

	pub(crate) fn clear_local_session(&self) {
		self.tokens.remove_access_token();

		for path in &self.config.refresh_cookie_paths {
			self.transport.expire_cookie(&self.config.refresh_cookie, path);
		}

		self.hint.clear_auth_session_hint();
	}
}
#[cfg(feature = "reqwest")]
impl SessionClient<ReqwestTransport> {
	/// Creates a client that provisions its own reqwest transport and cookie jar.
	pub fn new(
		config: SessionConfig,
		storage: Arc<dyn HintStorage>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self> {
		let transport = ReqwestTransport::new(&config)?;

		Ok(Self::with_transport(config, transport, storage, navigator))
	}
}
impl<T> Clone for SessionClient<T>
where
	T: SessionTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			transport: self.transport.clone(),
			tokens: self.tokens.clone(),
			hint: self.hint.clone(),
			navigator: self.navigator.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			refresh: self.refresh.clone(),
			bootstrap: self.bootstrap.clone(),
		}
	}
}
impl<T> Debug for SessionClient<T>
where
	T: SessionTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("api_base", &self.config.api_base.as_str())
			.field("tokens", &self.tokens)
			.field("refreshing", &self.is_refreshing())
			.finish()
	}
}
