//! Storage port for the session hint plus built-in implementations.
//!
//! The hint is a soft signal ("this client has had a session before"), so the port is
//! synchronous and every failure is recoverable. [`SessionHint`] wraps a port and swallows
//! those failures; the raw [`HintStorage`] methods still report them for callers that care.

pub mod detached;
pub mod file;
pub mod hint;
pub mod memory;

pub use detached::DetachedStorage;
pub use file::FileStorage;
pub use hint::SessionHint;
pub use memory::MemoryStorage;

// self
use crate::_prelude::*;

/// Key/value storage backend used to persist the session hint.
pub trait HintStorage
where
	Self: Send + Sync,
{
	/// Returns `false` when the execution context has no client storage (server-side).
	fn is_available(&self) -> bool {
		true
	}

	/// Reads the value stored under `key`.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes `value` under `key`.
	fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes `key`; removing a missing key is not an error.
	fn remove(&self, key: &str) -> Result<(), StoreError>;
}
impl Debug for dyn HintStorage {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HintStorage").field("available", &self.is_available()).finish()
	}
}

/// Error type produced by [`HintStorage`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
	/// Storage exists but refuses access (quota, sandboxing).
	#[error("Storage is unavailable: {message}.")]
	Unavailable {
		/// Human-readable error payload.
		message: String,
	},
}
