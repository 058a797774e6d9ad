//! Thread-safe in-memory [`StorageBackend`] for tests and short-lived processes.

// self
use crate::{
	_prelude::*,
	store::{StorageBackend, StorageChange, StoreError},
};

type EntryMap = Arc<RwLock<BTreeMap<String, String>>>;

/// Storage backend that keeps entries in-process; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend(EntryMap);
impl MemoryBackend {
	/// Returns a copy of every stored entry.
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		self.0.read().clone()
	}
}
impl StorageBackend for MemoryBackend {
	fn read(&self, key: &str) -> Option<String> {
		self.0.read().get(key).cloned()
	}

	fn apply(&self, changes: &[StorageChange<'_>]) -> Result<(), StoreError> {
		apply_changes(&mut self.0.write(), changes);

		Ok(())
	}
}

/// Applies a change batch to an ordered entry map.
pub(crate) fn apply_changes(map: &mut BTreeMap<String, String>, changes: &[StorageChange<'_>]) {
	for change in changes {
		match *change {
			StorageChange::Put { key, value } => {
				map.insert(key.to_owned(), value.to_owned());
			},
			StorageChange::Remove { key } => {
				map.remove(key);
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn batches_apply_in_order() {
		let backend = MemoryBackend::default();

		backend
			.apply(&[
				StorageChange::Put { key: "a", value: "1" },
				StorageChange::Put { key: "b", value: "2" },
				StorageChange::Remove { key: "a" },
			])
			.expect("Memory backend never fails.");

		assert_eq!(backend.read("a"), None);
		assert_eq!(backend.read("b").as_deref(), Some("2"));
		assert_eq!(backend.snapshot().len(), 1);
	}

	#[test]
	fn clones_share_entries() {
		let backend = MemoryBackend::default();
		let handle = backend.clone();

		handle
			.apply(&[StorageChange::Put { key: "k", value: "v" }])
			.expect("Write should succeed.");

		assert_eq!(backend.read("k").as_deref(), Some("v"));
	}
}
