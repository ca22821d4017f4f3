//! Thread-safe in-memory [`HintStorage`] for tests and non-persistent clients.

// std
use std::collections::HashMap;
// self
use crate::{
	_prelude::*,
	store::{HintStorage, StoreError},
};

/// Storage backend that keeps values in-process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(Arc<RwLock<HashMap<String, String>>>);
impl MemoryStorage {
	/// Returns a copy of the stored value, bypassing the [`HintStorage`] result wrapper.
	pub fn peek(&self, key: &str) -> Option<String> {
		self.0.read().get(key).cloned()
	}
}
impl HintStorage for MemoryStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.peek(key))
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}
