//! Null-object [`HintStorage`] for contexts without client storage.

// self
use crate::store::{HintStorage, StoreError};

/// Storage stand-in for server-side contexts: reports itself unavailable, reads nothing,
/// and drops writes.
///
/// A client built over this port never attempts a token refresh, because refreshing relies
/// on a cookie-carrying client session.
#[derive(Clone, Copy, Debug, Default)]
pub struct DetachedStorage;
impl HintStorage for DetachedStorage {
	fn is_available(&self) -> bool {
		false
	}

	fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
		Ok(None)
	}

	fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
		Ok(())
	}

	fn remove(&self, _key: &str) -> Result<(), StoreError> {
		Ok(())
	}
}
