//! Session hint: a persisted flag that marks this client as having had a session.

// self
use crate::{
	_prelude::*,
	obs::{self, FlowKind},
	store::HintStorage,
};

/// Value written while the hint is set.
pub const HINT_VALUE: &str = "1";

/// Soft "a session existed before" signal over an injected [`HintStorage`].
///
/// Never an authorization gate. Storage failures read as "no hint" and writes fail silently
/// after being logged.
#[derive(Clone, Debug)]
pub struct SessionHint {
	storage: Arc<dyn HintStorage>,
	key: String,
}
impl SessionHint {
	/// Binds the hint to `key` inside `storage`.
	pub fn new(storage: Arc<dyn HintStorage>, key: impl Into<String>) -> Self {
		Self { storage, key: key.into() }
	}

	/// Whether the underlying storage exists in this execution context.
	pub fn is_available(&self) -> bool {
		self.storage.is_available()
	}

	/// Returns `true` when the hint is set.
	pub fn has_auth_session_hint(&self) -> bool {
		if !self.storage.is_available() {
			return false;
		}

		match self.storage.get(&self.key) {
			Ok(value) => value.as_deref() == Some(HINT_VALUE),
			Err(e) => {
				obs::record_warning(FlowKind::Hint, format_args!("Session hint read failed: {e}"));

				false
			},
		}
	}

	/// Sets the hint.
	pub fn mark_auth_session_hint(&self) {
		if !self.storage.is_available() {
			return;
		}
		if let Err(e) = self.storage.set(&self.key, HINT_VALUE) {
			obs::record_warning(FlowKind::Hint, format_args!("Session hint write failed: {e}"));
		}
	}

	/// Clears the hint.
	pub fn clear_auth_session_hint(&self) {
		if !self.storage.is_available() {
			return;
		}
		if let Err(e) = self.storage.remove(&self.key) {
			obs::record_warning(FlowKind::Hint, format_args!("Session hint clear failed: {e}"));
		}
	}
}
