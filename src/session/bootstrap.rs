//! Startup gate that restores a session before ordinary requests go out.
//!
//! Requests to exempt auth endpoints never wait on the gate, so the refresh call it issues
//! (and a login submitted while it is pending) cannot deadlock on it.

// crates.io
use futures::FutureExt;
// self
use crate::{
	auth::{self, AccessToken},
	http::SessionTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{BootstrapFuture, SessionClient},
};

impl<T> SessionClient<T>
where
	T: SessionTransport,
{
	/// Starts (or joins) the bootstrap and returns a shareable future resolving to whether a
	/// session is established.
	///
	/// The returned future does the work; await it or spawn it. Until it completes, every
	/// non-exempt request waits on it. Bootstrap failures are never surfaced to those
	/// requests.
	pub fn bootstrap(&self) -> BootstrapFuture {
		let mut slot = self.bootstrap.lock();

		if let Some(pending) = slot.as_ref() {
			return pending.clone();
		}

		let client = self.clone();
		let future = async move {
			let established = client.restore_session().await;

			client.bootstrap.lock().take();

			established
		}
		.boxed()
		.shared();

		*slot = Some(future.clone());

		future
	}

	/// Returns `true` while a bootstrap is registered and unfinished.
	pub fn is_bootstrapping(&self) -> bool {
		self.bootstrap.lock().is_some()
	}

	pub(crate) async fn wait_for_bootstrap(&self) {
		let pending = self.bootstrap.lock().clone();

		if let Some(pending) = pending {
			pending.await;
		}
	}

	async fn restore_session(&self) -> bool {
		const KIND: FlowKind = FlowKind::Bootstrap;

		let span = FlowSpan::new(KIND, "restore_session");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let established = span
			.instrument(async {
				if !self.hint.has_auth_session_hint() {
					return false;
				}

				let held = self.tokens.get_access_token();

				if held
					.as_ref()
					.is_some_and(|t| !auth::is_token_expired(t.expose(), self.config.expiry_skew))
				{
					return true;
				}

				match self.join_refresh(held.as_ref().map(AccessToken::expose)).await {
					Ok(token) => token.is_some(),
					Err(e) => {
						obs::record_warning(KIND, format_args!("Session restore failed: {e}"));

						false
					},
				}
			})
			.await;

		obs::record_flow_outcome(
			KIND,
			if established { FlowOutcome::Success } else { FlowOutcome::Failure },
		);

		established
	}
}
