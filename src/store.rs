//! The single-writer token store and its pluggable key/value backends.
//!
//! [`TokenStore`] is the only owner of the session's [`Credential`]. Every write goes through
//! [`TokenStore::set`] or [`TokenStore::clear`], which take the writer lock, apply the change
//! to the backend, and republish the recomputed [`SessionState`] before releasing the lock.
//! The store keeps its own copy of the credential, so reads are synchronous, never suspend,
//! and observe a write even when the backend failed to persist it.

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	signal::{SessionSignal, SessionState, SessionSubscription},
};

/// Durable key/value storage used by [`TokenStore`].
///
/// The store reads from its backend only when it opens; writes arrive as one batch per store
/// mutation so backends can persist them atomically.
pub trait StorageBackend
where
	Self: Send + Sync,
{
	/// Returns the value stored under `key`.
	fn read(&self, key: &str) -> Option<String>;

	/// Applies every change in `changes` as one unit.
	fn apply(&self, changes: &[StorageChange<'_>]) -> Result<(), StoreError>;
}

/// A single mutation inside a [`StorageBackend::apply`] batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageChange<'a> {
	/// Inserts or replaces `key`.
	Put {
		/// Storage key.
		key: &'a str,
		/// New value.
		value: &'a str,
	},
	/// Deletes `key` if present.
	Remove {
		/// Storage key.
		key: &'a str,
	},
}

/// Error type produced by [`StorageBackend`] implementations.
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
}

/// The two fixed keys the credential lives under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageKeys {
	/// Key holding the access token.
	pub access_token: String,
	/// Key holding the refresh token.
	pub refresh_token: String,
}
impl Default for StorageKeys {
	fn default() -> Self {
		Self { access_token: "jwt_token".into(), refresh_token: "refresh_token".into() }
	}
}

/// Process-wide holder of the current [`Credential`].
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct TokenStore(Arc<StoreInner>);
impl TokenStore {
	/// Opens a store over `backend`, seeding the session signal from whatever it already holds.
	pub fn new(backend: Arc<dyn StorageBackend>, keys: StorageKeys) -> Self {
		let current = Self::read_credential(backend.as_ref(), &keys);
		let initial = Self::state_of(current.as_ref(), OffsetDateTime::now_utc());

		Self(Arc::new(StoreInner {
			backend,
			keys,
			current: RwLock::new(current),
			signal: SessionSignal::new(initial),
			writer: Mutex::new(()),
			scoped: RwLock::new(HashMap::new()),
		}))
	}

	/// Opens an empty store backed by process memory.
	pub fn in_memory() -> Self {
		Self::new(Arc::new(MemoryBackend::default()), StorageKeys::default())
	}

	/// Returns the stored credential, if an access token is present.
	pub fn get(&self) -> Option<Credential> {
		self.0.current.read().clone()
	}

	/// Returns only the stored access token.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.0.current.read().as_ref().map(|credential| credential.access_token.clone())
	}

	/// Stores a new access token and, when given, a new refresh token.
	///
	/// An absent `refresh_token` keeps the previously stored one. The new credential is
	/// readable and the session signal republished before this returns, even if the backend
	/// failed to persist.
	pub fn set(
		&self,
		access_token: &TokenSecret,
		refresh_token: Option<&TokenSecret>,
	) -> Result<(), StoreError> {
		let keys = &self.0.keys;
		let mut changes =
			vec![StorageChange::Put { key: &keys.access_token, value: access_token.expose() }];

		if let Some(refresh) = refresh_token {
			changes.push(StorageChange::Put { key: &keys.refresh_token, value: refresh.expose() });
		}

		self.write(&changes, false, |current| {
			let refresh_token = refresh_token
				.cloned()
				.or_else(|| current.take().and_then(|credential| credential.refresh_token));

			*current = Some(Credential { access_token: access_token.clone(), refresh_token });
		})
	}

	/// Removes both tokens and all session-scoped state.
	///
	/// Calling this on an already empty store is a no-op apart from the republish.
	pub fn clear(&self) -> Result<(), StoreError> {
		let keys = &self.0.keys;

		self.write(
			&[
				StorageChange::Remove { key: &keys.access_token },
				StorageChange::Remove { key: &keys.refresh_token },
			],
			true,
			|current| *current = None,
		)
	}

	/// Computes the session state from the stored access token at the current instant.
	pub fn session_state(&self) -> SessionState {
		self.session_state_at(OffsetDateTime::now_utc())
	}

	/// Computes the session state from the stored access token at `now`.
	pub fn session_state_at(&self, now: OffsetDateTime) -> SessionState {
		Self::state_of(self.0.current.read().as_ref(), now)
	}

	/// Returns the signal this store publishes to.
	pub fn signal(&self) -> &SessionSignal {
		&self.0.signal
	}

	/// Shorthand for `self.signal().subscribe()`.
	pub fn subscribe(&self) -> SessionSubscription {
		self.0.signal.subscribe()
	}

	/// Stores auxiliary state that lives until the next [`TokenStore::clear`].
	pub fn set_scoped(&self, key: impl Into<String>, value: impl Into<String>) {
		self.0.scoped.write().insert(key.into(), value.into());
	}

	/// Reads auxiliary state stored with [`TokenStore::set_scoped`].
	pub fn scoped(&self, key: &str) -> Option<String> {
		self.0.scoped.read().get(key).cloned()
	}

	fn write(
		&self,
		changes: &[StorageChange<'_>],
		wipe_scoped: bool,
		update: impl FnOnce(&mut Option<Credential>),
	) -> Result<(), StoreError> {
		let _writer = self.0.writer.lock();
		let result = self.0.backend.apply(changes);

		update(&mut *self.0.current.write());

		if wipe_scoped {
			self.0.scoped.write().clear();
		}

		self.0.signal.publish(self.session_state());

		result
	}

	fn read_credential(backend: &dyn StorageBackend, keys: &StorageKeys) -> Option<Credential> {
		let access_token = backend.read(&keys.access_token)?;

		Some(Credential::new(access_token, backend.read(&keys.refresh_token)))
	}

	fn state_of(credential: Option<&Credential>, now: OffsetDateTime) -> SessionState {
		let authenticated = credential.is_some_and(|credential| !credential.is_expired_at(now));

		SessionState::from_authenticated(authenticated)
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore")
			.field("keys", &self.0.keys)
			.field("state", &self.0.signal.current())
			.finish()
	}
}

struct StoreInner {
	backend: Arc<dyn StorageBackend>,
	keys: StorageKeys,
	current: RwLock<Option<Credential>>,
	signal: SessionSignal,
	writer: Mutex<()>,
	scoped: RwLock<HashMap<String, String>>,
}
