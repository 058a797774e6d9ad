//! File-backed [`StorageBackend`] that keeps tokens across process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{StorageBackend, StorageChange, StoreError, memory},
};

/// Persists entries to a JSON object after each batch, replacing the file atomically.
#[derive(Clone, Debug)]
pub struct FileBackend {
	path: PathBuf,
	entries: Arc<Mutex<BTreeMap<String, String>>>,
}
impl FileBackend {
	/// Opens (or creates) a backend at the provided path, eagerly loading existing entries.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let entries = Self::load_snapshot(&path)?;

		Ok(Self { path, entries: Arc::new(Mutex::new(entries)) })
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

	fn persist_locked(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
		let serialized =
			serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Serialization {
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
impl StorageBackend for FileBackend {
	fn read(&self, key: &str) -> Option<String> {
		self.entries.lock().get(key).cloned()
	}

	fn apply(&self, changes: &[StorageChange<'_>]) -> Result<(), StoreError> {
		let mut entries = self.entries.lock();

		memory::apply_changes(&mut entries, changes);

		// Still locked: concurrent batches reach the disk in the order they were applied.
		self.persist_locked(&entries)
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
			"bearer_session_file_backend_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn entries_survive_reopen() {
		let path = temp_path();
		let backend = FileBackend::open(&path).expect("Failed to open file backend.");

		backend
			.apply(&[
				StorageChange::Put { key: "jwt_token", value: "access" },
				StorageChange::Put { key: "refresh_token", value: "refresh" },
			])
			.expect("Failed to persist tokens.");
		backend
			.apply(&[StorageChange::Remove { key: "refresh_token" }])
			.expect("Failed to persist removal.");
		drop(backend);

		let reopened = FileBackend::open(&path).expect("Failed to reopen file backend.");

		assert_eq!(reopened.read("jwt_token").as_deref(), Some("access"));
		assert_eq!(reopened.read("refresh_token"), None);

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary storage file {}: {e}", path.display())
		});
	}

	#[test]
	fn empty_file_opens_as_empty_backend() {
		let path = temp_path();

		File::create(&path).expect("Failed to create empty fixture file.");

		let backend = FileBackend::open(&path).expect("Empty files should open cleanly.");

		assert_eq!(backend.read("jwt_token"), None);

		fs::remove_file(&path).expect("Failed to remove empty fixture file.");
	}

	#[test]
	fn corrupt_file_reports_serialization_error() {
		let path = temp_path();

		fs::write(&path, b"[not json").expect("Failed to write corrupt fixture file.");

		let err = FileBackend::open(&path).expect_err("Corrupt files should be rejected.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).expect("Failed to remove corrupt fixture file.");
	}
}
