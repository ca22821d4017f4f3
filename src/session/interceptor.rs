//! Request and response phases wrapped around every API call.
//!
//! Request phase: wait for a pending bootstrap (unless the target is an exempt auth
//! endpoint), optionally refresh an already-expired token, then attach the bearer token.
//!
//! Response phase, on `401` only: bail out for exempt endpoints and storage-less contexts;
//! without a session hint tear down local state and maybe redirect; otherwise obtain a
//! token through the single-flight refresh and replay the request exactly once. Any other
//! status, and the replay's own result, go straight back to the caller.

// crates.io
use ::http::StatusCode;
// self
use crate::{
	_prelude::*,
	auth::{self, AccessToken},
	error::StatusError,
	http::{ApiRequest, ApiResponse, SessionTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::SessionClient,
};

/// What the response phase decided after a 401.
enum Recovery {
	/// Replay the original request with this token.
	Replay(AccessToken),
	/// Give the caller this error.
	Fail(Error),
}

impl<T> SessionClient<T>
where
	T: SessionTransport,
{
	/// Sends `request` through the interceptor pair.
	///
	/// Non-2xx answers become [`Error::Status`]. A `401` may be recovered by one refresh and
	/// one replay; if the replay also fails, its error is returned as-is.
	pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
		const KIND: FlowKind = FlowKind::Request;

		let span = FlowSpan::new(KIND, "send");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.intercept(request)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn intercept(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		let exempt = self.config.is_exempt_endpoint(&request.url);

		request.timeout.get_or_insert(self.config.request_timeout);

		if !exempt {
			self.wait_for_bootstrap().await;

			if self.config.refresh_ahead {
				self.refresh_ahead().await;
			}
		}
		if let Some(token) = self.tokens.get_access_token() {
			request.set_bearer(&token)?;
		}

		let response = self.transport.execute(request.clone()).await?;

		if response.status != StatusCode::UNAUTHORIZED {
			return Ok(response.error_for_status()?);
		}

		let original =
			StatusError::new(response.status.as_u16(), response.url.as_str(), &response.body);

		match self.recover(&request, exempt, original).await {
			Recovery::Replay(token) => {
				request.set_bearer(&token)?;

				Ok(self.transport.execute(request).await?.error_for_status()?)
			},
			Recovery::Fail(e) => Err(e),
		}
	}

	async fn recover(&self, request: &ApiRequest, exempt: bool, original: StatusError) -> Recovery {
		if exempt || !self.hint.is_available() {
			return Recovery::Fail(original.into());
		}
		if !self.hint.has_auth_session_hint() {
			obs::record_event(FlowKind::Request, "401 without a session hint; skipping refresh.");
			self.clear_local_session();
			self.redirect_if_protected();

			return Recovery::Fail(original.into());
		}

		match self.join_refresh(request.bearer_token()).await {
			Ok(Some(token)) => Recovery::Replay(token),
			Ok(None) => {
				self.redirect_to_login();

				Recovery::Fail(original.into())
			},
			Err(e) => {
				self.redirect_to_login();

				Recovery::Fail(e)
			},
		}
	}

	async fn refresh_ahead(&self) {
		let Some(token) = self.tokens.get_access_token() else {
			return;
		};

		if !auth::is_token_expired(token.expose(), self.config.expiry_skew)
			|| !self.hint.has_auth_session_hint()
		{
			return;
		}

		obs::record_event(FlowKind::Request, "Held token is expired; refreshing before send.");

		// Failure already tore the session down; the request goes out unauthenticated.
		if !matches!(self.join_refresh(Some(token.expose())).await, Ok(Some(_))) {
			self.redirect_to_login();
		}
	}

	/// Redirect used when no session ever existed: only protected, non-public pages bounce.
	fn redirect_if_protected(&self) {
		let Some(location) = self.navigator.location() else {
			return;
		};

		if self.config.is_protected_path(&location.path)
			&& !self.config.is_public_path(&location.path)
		{
			self.navigator.navigate(&self.config.login_redirect(&location));
		}
	}

	/// Redirect used when a refresh failed: every page except public auth pages bounces.
	///
	/// Once one caller has navigated the location is the public login page, so callers
	/// released by the same failure do not navigate again.
	fn redirect_to_login(&self) {
		let Some(location) = self.navigator.location() else {
			return;
		};

		if !self.config.is_public_path(&location.path) {
			self.navigator.navigate(&self.config.login_redirect(&location));
		}
	}
}
