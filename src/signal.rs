//! Broadcast "authenticated?" state for downstream observers.
//!
//! The signal caches the value last published by the [`TokenStore`](crate::store::TokenStore)
//! and the store republishes under its write lock on every mutation, so the cached value is
//! never stale across store writes. New subscribers receive the current value first, then
//! every later transition in the order it happened. Consecutive equal states are delivered once.

// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::_prelude::*;

/// Login state derived from the stored access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
	/// The store holds an access token that has not expired.
	Authenticated,
	/// No access token is stored, or the stored one is expired or undecodable.
	Unauthenticated,
}
impl SessionState {
	/// Maps a boolean "is logged in" flag onto the enum.
	pub const fn from_authenticated(authenticated: bool) -> Self {
		if authenticated { Self::Authenticated } else { Self::Unauthenticated }
	}

	/// Returns `true` for [`SessionState::Authenticated`].
	pub const fn is_authenticated(self) -> bool {
		matches!(self, Self::Authenticated)
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Authenticated => "authenticated",
			Self::Unauthenticated => "unauthenticated",
		}
	}
}
impl Display for SessionState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Publish/subscribe cell for [`SessionState`].
#[derive(Clone, Debug)]
pub struct SessionSignal(Arc<Mutex<SignalInner>>);
impl SessionSignal {
	/// Creates a signal seeded with `initial`.
	pub fn new(initial: SessionState) -> Self {
		Self(Arc::new(Mutex::new(SignalInner { current: initial, observers: Vec::new() })))
	}

	/// Returns the most recently published state.
	pub fn current(&self) -> SessionState {
		self.0.lock().current
	}

	/// Registers an observer. The current state is queued immediately.
	pub fn subscribe(&self) -> SessionSubscription {
		let (tx, rx) = mpsc::unbounded_channel();
		let mut inner = self.0.lock();

		// The receiver is alive, so this send cannot fail.
		let _ = tx.send(inner.current);

		inner.observers.push(tx);

		SessionSubscription(rx)
	}

	/// Number of observers that have not dropped their subscription yet.
	pub fn observer_count(&self) -> usize {
		let mut inner = self.0.lock();

		inner.observers.retain(|tx| !tx.is_closed());
		inner.observers.len()
	}

	/// Publishes `state`, returning `true` when it differs from the previous value and was
	/// therefore delivered.
	pub(crate) fn publish(&self, state: SessionState) -> bool {
		let mut inner = self.0.lock();

		if inner.current == state {
			return false;
		}

		inner.current = state;
		inner.observers.retain(|tx| tx.send(state).is_ok());

		true
	}
}
impl Default for SessionSignal {
	fn default() -> Self {
		Self::new(SessionState::Unauthenticated)
	}
}

#[derive(Debug)]
struct SignalInner {
	current: SessionState,
	observers: Vec<UnboundedSender<SessionState>>,
}

/// Receiving end handed out by [`SessionSignal::subscribe`].
#[derive(Debug)]
pub struct SessionSubscription(UnboundedReceiver<SessionState>);
impl SessionSubscription {
	/// Waits for the next state. Returns `None` once the signal is gone.
	pub async fn next(&mut self) -> Option<SessionState> {
		self.0.recv().await
	}

	/// Returns the next queued state without waiting.
	pub fn try_next(&mut self) -> Option<SessionState> {
		self.0.try_recv().ok()
	}

	/// Takes every state queued so far.
	pub fn drain(&mut self) -> Vec<SessionState> {
		let mut states = Vec::new();

		while let Some(state) = self.try_next() {
			states.push(state);
		}

		states
	}
}
