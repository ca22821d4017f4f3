//! File-backed [`HintStorage`] so a hint survives process restarts, the way browser-local
//! storage survives page reloads.

// std
use std::{
	collections::BTreeMap,
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{HintStorage, StoreError},
};

/// Persists key/value pairs to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStorage {
	path: PathBuf,
	inner: Arc<RwLock<BTreeMap<String, String>>>,
}
impl FileStorage {
	/// Opens (or creates) storage at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the backing file.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<BTreeMap<String, String>, StoreError> {
		if !path.exists() {
			return Ok(BTreeMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(BTreeMap::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create storage directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &BTreeMap<String, String>) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize storage snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl HintStorage for FileStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.inner.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		guard.insert(key.to_owned(), value.to_owned());

		self.persist_locked(&guard)
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		let mut guard = self.inner.write();

		if guard.remove(key).is_none() {
			return Ok(());
		}

		self.persist_locked(&guard)
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// self
	use super::*;

	fn temp_path() -> PathBuf {
		let unique = format!(
			"token_relay_file_storage_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn values_survive_reopen() {
		let path = temp_path();
		let storage = FileStorage::open(&path).expect("Failed to open file storage.");

		assert_eq!(storage.path(), path.as_path());

		storage.set("auth_session_hint", "1").expect("Failed to write hint.");
		storage.set("other", "x").expect("Failed to write second key.");
		storage.remove("other").expect("Failed to remove second key.");
		drop(storage);

		let reopened = FileStorage::open(&path).expect("Failed to reopen file storage.");

		assert_eq!(
			reopened.get("auth_session_hint").expect("Read should succeed."),
			Some("1".to_owned())
		);
		assert_eq!(reopened.get("other").expect("Read should succeed."), None);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary storage file {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_file_is_a_serialization_error() {
		let path = temp_path();

		fs::write(&path, b"{not json").expect("Failed to seed corrupt file.");

		let err = FileStorage::open(&path).expect_err("Corrupt file should be rejected.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary storage file {}: {e}", path.display())
		});
	}
}
