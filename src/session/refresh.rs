//! Single-flight session refresh with a FIFO subscriber queue.
//!
//! The first caller that needs a new token while no refresh is running becomes the leader
//! and issues the one `POST` to the refresh endpoint. Callers arriving while it runs park on
//! the queue and receive the leader's result in arrival order. The flag and the queue share
//! one lock, and the leader drains the queue in the same critical section that clears the
//! flag, so no caller can park after the drain and wait forever. Dropping a lease without
//! settling it (cancelled leader) releases every parked caller empty-handed.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::mem;
// crates.io
use ::http::Method;
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, TokenHolder},
	error::RefreshError,
	http::{ApiRequest, SessionTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::SessionClient,
};

type Subscriber = oneshot::Sender<Option<AccessToken>>;

/// Single-flight flag plus the callers waiting on the in-flight refresh.
#[derive(Debug, Default)]
pub struct RefreshQueue(Mutex<QueueState>);
impl RefreshQueue {
	/// Returns `true` while a leader holds the refresh lease.
	pub fn is_refreshing(&self) -> bool {
		self.0.lock().refreshing
	}

	/// Number of parked callers.
	pub fn pending(&self) -> usize {
		self.0.lock().subscribers.len()
	}

	/// Decides this caller's role, atomically with respect to the flag.
	///
	/// `sent` is the token the caller's failed request carried. When no refresh is running
	/// and the holder already has a different token, a refresh completed in the meantime and
	/// the caller can replay with it directly.
	pub(crate) fn join(self: &Arc<Self>, tokens: &TokenHolder, sent: Option<&str>) -> Ticket {
		let mut state = self.0.lock();

		if state.refreshing {
			let (tx, rx) = oneshot::channel();

			state.subscribers.push_back(tx);

			return Ticket::Follower(rx);
		}
		if let Some(current) = tokens.get_access_token().filter(|t| Some(t.expose()) != sent) {
			return Ticket::Current(current);
		}

		state.refreshing = true;

		Ticket::Leader(RefreshLease { queue: self.clone(), settled: false })
	}

	fn settle(&self, token: Option<&AccessToken>) {
		let subscribers = {
			let mut state = self.0.lock();

			state.refreshing = false;

			mem::take(&mut state.subscribers)
		};

		for subscriber in subscribers {
			// A closed receiver belongs to a caller that gave up waiting.
			let _ = subscriber.send(token.cloned());
		}
	}
}

#[derive(Debug, Default)]
struct QueueState {
	refreshing: bool,
	subscribers: VecDeque<Subscriber>,
}

/// Role assigned by [`RefreshQueue::join`].
#[derive(Debug)]
pub(crate) enum Ticket {
	/// Issue the refresh call and settle the lease.
	Leader(RefreshLease),
	/// Wait for the leader's token (`None` when its refresh failed).
	Follower(oneshot::Receiver<Option<AccessToken>>),
	/// A newer token is already held.
	Current(AccessToken),
}

/// Exclusive right to run the refresh call; releases the queue on settle or drop.
#[derive(Debug)]
pub(crate) struct RefreshLease {
	queue: Arc<RefreshQueue>,
	settled: bool,
}
impl RefreshLease {
	fn settle(mut self, token: Option<&AccessToken>) {
		self.settled = true;
		self.queue.settle(token);
	}
}
impl Drop for RefreshLease {
	fn drop(&mut self) {
		if !self.settled {
			self.queue.settle(None);
		}
	}
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
	#[serde(default, rename = "accessToken")]
	access_token: Option<String>,
	#[serde(default)]
	token: Option<String>,
}
impl RefreshResponse {
	fn into_token(self) -> Option<AccessToken> {
		let present = |value: &String| !value.is_empty();

		self.access_token.filter(present).or(self.token.filter(present)).map(AccessToken::new)
	}
}

impl<T> SessionClient<T>
where
	T: SessionTransport,
{
	/// Refreshes the session now, joining an in-flight refresh if one is running.
	///
	/// Failure ends the session locally (token, refresh cookies, and hint are cleared) but
	/// never navigates; redirects belong to the request path.
	pub async fn refresh_session(&self) -> Result<AccessToken> {
		if !self.hint.is_available() {
			return Err(RefreshError::StorageUnavailable.into());
		}

		let current = self.tokens.get_access_token();

		self.join_refresh(current.as_ref().map(AccessToken::expose))
			.await?
			.ok_or_else(|| RefreshError::Abandoned.into())
	}

	/// `Ok(None)` means this caller followed a refresh that failed; `Err` means this caller
	/// led it.
	pub(crate) async fn join_refresh(&self, sent: Option<&str>) -> Result<Option<AccessToken>> {
		match self.refresh.join(&self.tokens, sent) {
			Ticket::Current(token) => Ok(Some(token)),
			Ticket::Follower(rx) => {
				self.refresh_metrics.record_queued();
				obs::record_flow_outcome(FlowKind::Refresh, FlowOutcome::Queued);

				Ok(rx.await.ok().flatten())
			},
			Ticket::Leader(lease) => self.lead_refresh(lease).await.map(Some),
		}
	}

	async fn lead_refresh(&self, lease: RefreshLease) -> Result<AccessToken> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "lead_refresh");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.refresh_metrics.record_attempt();

		match span.instrument(self.call_refresh()).await {
			Ok(token) => {
				self.tokens.set_access_token(token.clone());
				self.hint.mark_auth_session_hint();
				lease.settle(Some(&token));
				self.refresh_metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				Ok(token)
			},
			Err(e) => {
				obs::record_warning(KIND, format_args!("Session refresh failed: {e}"));
				self.clear_local_session();
				lease.settle(None);
				self.refresh_metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				Err(e)
			},
		}
	}

	async fn call_refresh(&self) -> Result<AccessToken> {
		let url = self.config.refresh_url()?;
		let request = ApiRequest::new(Method::POST, url).timeout(self.config.refresh_timeout);
		let response = self.transport.execute(request).await.map_err(RefreshError::Transport)?;

		if !response.is_success() {
			return Err(RefreshError::Rejected { status: response.status.as_u16() }.into());
		}

		let mut deserializer = serde_json::Deserializer::from_slice(&response.body);
		let body: RefreshResponse = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| RefreshError::Malformed { source })?;

		body.into_token().ok_or_else(|| RefreshError::MissingToken.into())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn leader(ticket: Ticket) -> RefreshLease {
		match ticket {
			Ticket::Leader(lease) => lease,
			other => panic!("Expected leader ticket, got {other:?}."),
		}
	}

	fn follower(ticket: Ticket) -> oneshot::Receiver<Option<AccessToken>> {
		match ticket {
			Ticket::Follower(rx) => rx,
			other => panic!("Expected follower ticket, got {other:?}."),
		}
	}

	#[test]
	fn second_caller_follows_the_first() {
		let queue = Arc::new(RefreshQueue::default());
		let tokens = TokenHolder::default();
		let lease = leader(queue.join(&tokens, None));
		let mut first = follower(queue.join(&tokens, None));
		let mut second = follower(queue.join(&tokens, None));

		assert!(queue.is_refreshing());
		assert_eq!(queue.pending(), 2);

		lease.settle(Some(&AccessToken::new("fresh")));

		assert!(!queue.is_refreshing());
		assert_eq!(queue.pending(), 0);
		for rx in [&mut first, &mut second] {
			let token = rx.try_recv().expect("Sender should have resolved the subscriber.");

			assert_eq!(token.flatten().as_ref().map(AccessToken::expose), Some("fresh"));
		}
	}

	#[test]
	fn dropped_lease_releases_followers_empty_handed() {
		let queue = Arc::new(RefreshQueue::default());
		let tokens = TokenHolder::default();
		let lease = leader(queue.join(&tokens, None));
		let mut waiting = follower(queue.join(&tokens, None));

		drop(lease);

		assert!(!queue.is_refreshing());
		assert_eq!(waiting.try_recv().expect("Follower should be released."), Some(None));

		let _next = leader(queue.join(&tokens, None));
	}

	#[test]
	fn newer_held_token_skips_the_refresh() {
		let queue = Arc::new(RefreshQueue::default());
		let tokens = TokenHolder::default();

		tokens.set_access_token(AccessToken::new("rotated"));

		match queue.join(&tokens, Some("stale")) {
			Ticket::Current(token) => assert_eq!(token.expose(), "rotated"),
			other => panic!("Expected current ticket, got {other:?}."),
		}

		assert!(!queue.is_refreshing());

		let _lease = leader(queue.join(&tokens, Some("rotated")));
	}

	#[test]
	fn refresh_response_prefers_access_token_field() {
		let parse = |raw: &str| {
			serde_json::from_str::<RefreshResponse>(raw)
				.expect("Fixture should parse.")
				.into_token()
				.map(|token| token.expose().to_owned())
		};

		assert_eq!(parse(r#"{"accessToken":"a","token":"b"}"#).as_deref(), Some("a"));
		assert_eq!(parse(r#"{"token":"b"}"#).as_deref(), Some("b"));
		assert_eq!(parse(r#"{"accessToken":"","token":"b"}"#).as_deref(), Some("b"));
		assert_eq!(parse(r#"{"accessToken":"","user":{}}"#), None);
		assert_eq!(parse(r#"{"accessToken":null}"#), None);
	}
}
