//! In-memory token holder with synchronous change listeners.

// std
use std::sync::{
	Weak,
	atomic::{AtomicU64, Ordering},
};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, JwtPayload, claims},
};

type Listener = Arc<dyn Fn(Option<&AccessToken>) + Send + Sync>;
type ListenerList = Mutex<Vec<(u64, Listener)>>;

/// Single source of truth for the current bearer token within a session client.
///
/// Listeners run synchronously on the mutating thread, in subscription order, after the new
/// value is visible through [`TokenHolder::get_access_token`].
#[derive(Default)]
pub struct TokenHolder {
	token: RwLock<Option<AccessToken>>,
	listeners: Arc<ListenerList>,
	next_id: AtomicU64,
}
impl TokenHolder {
	/// Returns the current token, if any.
	pub fn get_access_token(&self) -> Option<AccessToken> {
		self.token.read().clone()
	}

	/// Replaces the current token and notifies listeners with the new value.
	pub fn set_access_token(&self, token: AccessToken) {
		*self.token.write() = Some(token.clone());

		self.notify(Some(&token));
	}

	/// Clears the current token and notifies listeners with `None`.
	pub fn remove_access_token(&self) {
		*self.token.write() = None;

		self.notify(None);
	}

	/// Decodes the current token's payload.
	pub fn payload(&self) -> Option<JwtPayload> {
		self.token.read().as_ref().and_then(|token| claims::decode_token(token.expose()))
	}

	/// Registers `listener` for every set/remove; the returned guard is its disposer.
	pub fn subscribe<F>(&self, listener: F) -> Subscription
	where
		F: 'static + Fn(Option<&AccessToken>) + Send + Sync,
	{
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);

		self.listeners.lock().push((id, Arc::new(listener)));

		Subscription { id, listeners: Arc::downgrade(&self.listeners) }
	}

	/// Number of registered listeners.
	pub fn listener_count(&self) -> usize {
		self.listeners.lock().len()
	}

	fn notify(&self, token: Option<&AccessToken>) {
		// Snapshot so listeners may subscribe or unsubscribe re-entrantly.
		let snapshot =
			self.listeners.lock().iter().map(|(_, listener)| listener.clone()).collect::<Vec<_>>();

		for listener in snapshot {
			listener(token);
		}
	}
}
impl Debug for TokenHolder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenHolder")
			.field("token", &self.token.read().as_ref().map(|_| "<redacted>"))
			.field("listeners", &self.listener_count())
			.finish()
	}
}

/// Disposer returned by [`TokenHolder::subscribe`]; dropping it unsubscribes the listener.
#[must_use = "dropping the subscription unsubscribes the listener immediately"]
pub struct Subscription {
	id: u64,
	listeners: Weak<ListenerList>,
}
impl Subscription {
	/// Removes the listener explicitly.
	pub fn unsubscribe(self) {}

	/// Keeps the listener registered for the lifetime of its holder.
	pub fn forget(mut self) {
		self.listeners = Weak::new();
	}
}
impl Drop for Subscription {
	fn drop(&mut self) {
		if let Some(listeners) = self.listeners.upgrade() {
			listeners.lock().retain(|(id, _)| *id != self.id);
		}
	}
}
impl Debug for Subscription {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Subscription").field("id", &self.id).finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn recorder(holder: &TokenHolder) -> (Arc<Mutex<Vec<Option<String>>>>, Subscription) {
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = seen.clone();
		let subscription = holder.subscribe(move |token| {
			sink.lock().push(token.map(|value| value.expose().to_owned()));
		});

		(seen, subscription)
	}

	#[test]
	fn listeners_observe_set_and_remove_in_order() {
		let holder = TokenHolder::default();
		let order = Arc::new(Mutex::new(Vec::new()));
		let (first_order, second_order) = (order.clone(), order.clone());
		let _first = holder.subscribe(move |_| first_order.lock().push("first"));
		let _second = holder.subscribe(move |_| second_order.lock().push("second"));
		let (seen, _sub) = recorder(&holder);

		holder.set_access_token(AccessToken::new("a.b.c"));
		holder.remove_access_token();

		assert_eq!(*order.lock(), vec!["first", "second", "first", "second"]);
		assert_eq!(*seen.lock(), vec![Some("a.b.c".to_owned()), None]);
	}

	#[test]
	fn remove_twice_notifies_twice() {
		let holder = TokenHolder::default();
		let (seen, _sub) = recorder(&holder);

		holder.remove_access_token();
		holder.remove_access_token();

		assert!(holder.get_access_token().is_none());
		assert_eq!(*seen.lock(), vec![None, None]);
	}

	#[test]
	fn listener_sees_new_value_through_getter() {
		let holder = Arc::new(TokenHolder::default());
		let observed = Arc::new(Mutex::new(None));
		let (inner, sink) = (Arc::downgrade(&holder), observed.clone());
		let _sub = holder.subscribe(move |_| {
			if let Some(holder) = inner.upgrade() {
				*sink.lock() = holder.get_access_token();
			}
		});

		holder.set_access_token(AccessToken::new("x.y.z"));

		assert_eq!(observed.lock().as_ref().map(AccessToken::expose), Some("x.y.z"));
	}

	#[test]
	fn dropping_subscription_unsubscribes() {
		let holder = TokenHolder::default();
		let (seen, sub) = recorder(&holder);

		holder.set_access_token(AccessToken::new("one"));
		sub.unsubscribe();
		holder.set_access_token(AccessToken::new("two"));

		assert_eq!(holder.listener_count(), 0);
		assert_eq!(*seen.lock(), vec![Some("one".to_owned())]);

		let (kept, sub) = recorder(&holder);

		sub.forget();
		holder.remove_access_token();

		assert_eq!(holder.listener_count(), 1);
		assert_eq!(*kept.lock(), vec![None]);
	}
}
