//! Session client configuration: endpoints, route classification, storage and cookie names,
//! and timeouts.
//!
//! Defaults mirror the storefront API: `POST /auth/refresh` with a `refreshToken` cookie,
//! login at `/login?callbackUrl=…`, and account/checkout/admin areas treated as protected.

// std
use std::time::Duration as StdDuration;
// crates.io
use url::form_urlencoded;
// self
use crate::{_prelude::*, auth::DEFAULT_EXPIRY_SKEW, error::ConfigError, nav::Location};

/// Auth endpoints that never wait on bootstrap and never trigger a refresh on 401.
pub const DEFAULT_EXEMPT_ENDPOINTS: [&str; 8] = [
	"/auth/login",
	"/auth/register",
	"/auth/refresh",
	"/auth/verify-2fa",
	"/auth/verify-email",
	"/auth/forgot-password",
	"/auth/reset-password",
	"/auth/resend-verification",
];
/// Pages that never redirect to login.
pub const DEFAULT_PUBLIC_PATHS: [&str; 6] =
	["/login", "/register", "/verify-email", "/forgot-password", "/reset-password", "/2fa"];
/// Pages that redirect to login once the session is definitively gone.
pub const DEFAULT_PROTECTED_PATHS: [&str; 6] =
	["/profile", "/settings", "/orders", "/checkout", "/admin", "/merchant"];

/// Runtime configuration for a [`SessionClient`](crate::session::SessionClient).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Base URL every relative request path resolves against.
	pub api_base: Url,
	/// Refresh endpoint, relative to `api_base`.
	#[serde(default = "defaults::refresh_path")]
	pub refresh_path: String,
	/// Login page path used for redirects.
	#[serde(default = "defaults::login_path")]
	pub login_path: String,
	/// Query parameter carrying the return location.
	#[serde(default = "defaults::callback_param")]
	pub callback_param: String,
	/// Endpoint paths exempt from bootstrap waits and refresh-on-401.
	#[serde(default = "defaults::exempt_endpoints")]
	pub exempt_endpoints: Vec<String>,
	/// Page prefixes that never redirect to login.
	#[serde(default = "defaults::public_paths")]
	pub public_paths: Vec<String>,
	/// Page prefixes that redirect to login when no session exists.
	#[serde(default = "defaults::protected_paths")]
	pub protected_paths: Vec<String>,
	/// Storage key of the session hint.
	#[serde(default = "defaults::hint_key")]
	pub hint_key: String,
	/// Name of the HttpOnly refresh cookie.
	#[serde(default = "defaults::refresh_cookie")]
	pub refresh_cookie: String,
	/// Cookie paths at which the refresh cookie is expired on logout.
	#[serde(default = "defaults::refresh_cookie_paths")]
	pub refresh_cookie_paths: Vec<String>,
	/// Clock skew used when judging token expiry.
	#[serde(default = "defaults::expiry_skew")]
	pub expiry_skew: Duration,
	/// Timeout applied to regular and replayed requests.
	#[serde(default = "defaults::request_timeout")]
	pub request_timeout: StdDuration,
	/// Timeout applied to the refresh call.
	#[serde(default = "defaults::refresh_timeout")]
	pub refresh_timeout: StdDuration,
	/// Refresh before sending when the held token is already expired.
	#[serde(default)]
	pub refresh_ahead: bool,
}
impl SessionConfig {
	/// Returns a builder seeded with defaults for `api_base`.
	pub fn builder(api_base: Url) -> SessionConfigBuilder {
		SessionConfigBuilder::new(api_base)
	}

	/// Resolves `path` (relative or absolute URL) against `api_base`.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		let mut base = self.api_base.clone();

		if !base.path().ends_with('/') {
			let normalized = format!("{}/", base.path());

			base.set_path(&normalized);
		}

		base.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })
	}

	/// Absolute URL of the refresh endpoint.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.refresh_path)
	}

	/// Returns `true` when `url` targets one of the exempt auth endpoints.
	///
	/// An endpoint matches when its segments appear as a contiguous run anywhere in the
	/// request path, so `/auth/verify-email` also covers `/api/auth/verify-email/<token>`.
	pub fn is_exempt_endpoint(&self, url: &Url) -> bool {
		let path = segments(url.path());

		self.exempt_endpoints.iter().any(|endpoint| {
			let endpoint = segments(endpoint);

			!endpoint.is_empty() && path.windows(endpoint.len()).any(|run| run == endpoint.as_slice())
		})
	}

	/// Returns `true` when `path` sits under a public prefix.
	pub fn is_public_path(&self, path: &str) -> bool {
		self.public_paths.iter().any(|prefix| matches_prefix(path, prefix))
	}

	/// Returns `true` when `path` sits under a protected prefix.
	pub fn is_protected_path(&self, path: &str) -> bool {
		self.protected_paths.iter().any(|prefix| matches_prefix(path, prefix))
	}

	/// Builds `/login?callbackUrl=<encoded path+query>` for `location`.
	pub fn login_redirect(&self, location: &Location) -> String {
		let callback =
			form_urlencoded::byte_serialize(location.path_and_query().as_bytes()).collect::<String>();

		format!("{}?{}={callback}", self.login_path, self.callback_param)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.api_base.cannot_be_a_base() {
			return Err(ConfigError::InvalidBaseUrl { url: self.api_base.to_string() });
		}
		if !self.login_path.starts_with('/') {
			return Err(ConfigError::RelativePath {
				field: "login",
				path: self.login_path.clone(),
			});
		}
		if let Some(path) = self.refresh_cookie_paths.iter().find(|path| !path.starts_with('/')) {
			return Err(ConfigError::RelativePath { field: "cookie", path: path.clone() });
		}
		if self.hint_key.trim().is_empty() {
			return Err(ConfigError::EmptyHintKey);
		}
		if self.request_timeout.is_zero() {
			return Err(ConfigError::NonPositiveTimeout { field: "request" });
		}
		if self.refresh_timeout.is_zero() {
			return Err(ConfigError::NonPositiveTimeout { field: "refresh" });
		}

		self.refresh_url()?;

		Ok(())
	}
}

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder(SessionConfig);
impl SessionConfigBuilder {
	/// Creates a builder with default routes for `api_base`.
	pub fn new(api_base: Url) -> Self {
		Self(SessionConfig {
			api_base,
			refresh_path: defaults::refresh_path(),
			login_path: defaults::login_path(),
			callback_param: defaults::callback_param(),
			exempt_endpoints: defaults::exempt_endpoints(),
			public_paths: defaults::public_paths(),
			protected_paths: defaults::protected_paths(),
			hint_key: defaults::hint_key(),
			refresh_cookie: defaults::refresh_cookie(),
			refresh_cookie_paths: defaults::refresh_cookie_paths(),
			expiry_skew: defaults::expiry_skew(),
			request_timeout: defaults::request_timeout(),
			refresh_timeout: defaults::refresh_timeout(),
			refresh_ahead: false,
		})
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.0.refresh_path = path.into();

		self
	}

	/// Overrides the login page path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.0.login_path = path.into();

		self
	}

	/// Adds an endpoint to the exempt list.
	pub fn exempt_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.0.exempt_endpoints.push(endpoint.into());

		self
	}

	/// Replaces the public path prefixes.
	pub fn public_paths<I, S>(mut self, paths: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.0.public_paths = paths.into_iter().map(Into::into).collect();

		self
	}

	/// Replaces the protected path prefixes.
	pub fn protected_paths<I, S>(mut self, paths: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.0.protected_paths = paths.into_iter().map(Into::into).collect();

		self
	}

	/// Overrides the session hint storage key.
	pub fn hint_key(mut self, key: impl Into<String>) -> Self {
		self.0.hint_key = key.into();

		self
	}

	/// Overrides the clock skew used for expiry checks.
	pub fn expiry_skew(mut self, skew: Duration) -> Self {
		self.0.expiry_skew = if skew.is_negative() { Duration::ZERO } else { skew };

		self
	}

	/// Overrides the timeout for regular and replayed requests.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.0.request_timeout = timeout;

		self
	}

	/// Overrides the refresh call timeout.
	pub fn refresh_timeout(mut self, timeout: StdDuration) -> Self {
		self.0.refresh_timeout = timeout;

		self
	}

	/// Enables refreshing before sending when the held token is already expired.
	pub fn refresh_ahead(mut self, enabled: bool) -> Self {
		self.0.refresh_ahead = enabled;

		self
	}

	/// Validates and returns the configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		self.0.validate()?;

		Ok(self.0)
	}
}

fn segments(path: &str) -> Vec<&str> {
	path.split('/').filter(|segment| !segment.is_empty()).collect()
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
	let prefix = prefix.trim_end_matches('/');

	if prefix.is_empty() {
		return false;
	}

	match path.strip_prefix(prefix) {
		Some(rest) => rest.is_empty() || rest.starts_with('/'),
		None => false,
	}
}

mod defaults {
	// self
	use super::*;

	pub(super) fn refresh_path() -> String {
		"/auth/refresh".into()
	}

	pub(super) fn login_path() -> String {
		"/login".into()
	}

	pub(super) fn callback_param() -> String {
		"callbackUrl".into()
	}

	pub(super) fn exempt_endpoints() -> Vec<String> {
		DEFAULT_EXEMPT_ENDPOINTS.iter().map(|&path| path.to_owned()).collect()
	}

	pub(super) fn public_paths() -> Vec<String> {
		DEFAULT_PUBLIC_PATHS.iter().map(|&path| path.to_owned()).collect()
	}

	pub(super) fn protected_paths() -> Vec<String> {
		DEFAULT_PROTECTED_PATHS.iter().map(|&path| path.to_owned()).collect()
	}

	pub(super) fn hint_key() -> String {
		"auth_session_hint".into()
	}

	pub(super) fn refresh_cookie() -> String {
		"refreshToken".into()
	}

	pub(super) fn refresh_cookie_paths() -> Vec<String> {
		vec!["/api".into(), "/".into()]
	}

	pub(super) fn expiry_skew() -> Duration {
		DEFAULT_EXPIRY_SKEW
	}

	pub(super) fn request_timeout() -> StdDuration {
		StdDuration::from_secs(30)
	}

	pub(super) fn refresh_timeout() -> StdDuration {
		StdDuration::from_secs(10)
	}
}
