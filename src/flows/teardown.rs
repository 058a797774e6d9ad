//! Terminal "session lost" handling shared by the gatekeeper and the renewal timer.

// self
use crate::{
	_prelude::*,
	flows::RefreshFailure,
	obs::{self, FlowKind},
	store::TokenStore,
};

/// Notice shown on the login screen after an irrecoverable refresh failure.
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please login again.";

/// Routing collaborator told to show the login screen.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to the login screen, displaying `notice`.
	fn redirect_to_login(&self, notice: &str);
}

/// [`Navigator`] for headless callers with no login screen.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;
impl Navigator for NoopNavigator {
	fn redirect_to_login(&self, _: &str) {}
}

/// Clears the session and redirects to login once per failed refresh cycle.
#[derive(Clone)]
pub struct SessionTeardown {
	store: TokenStore,
	navigator: Arc<dyn Navigator>,
	last_cycle: Arc<AtomicU64>,
}
impl SessionTeardown {
	/// Creates a teardown handle over `store` and `navigator`.
	pub fn new(store: TokenStore, navigator: Arc<dyn Navigator>) -> Self {
		Self { store, navigator, last_cycle: Arc::new(AtomicU64::new(0)) }
	}

	/// Clears the store and redirects to login, unless this cycle was already handled.
	///
	/// Returns `true` when this call performed the teardown.
	pub fn tear_down(&self, failure: &RefreshFailure) -> bool {
		if self.last_cycle.fetch_max(failure.cycle, Ordering::AcqRel) >= failure.cycle {
			return false;
		}
		if let Err(e) = self.store.clear() {
			obs::warn_flow(FlowKind::Refresh, "session store could not be cleared", &e);
		}

		self.navigator.redirect_to_login(SESSION_EXPIRED_NOTICE);

		true
	}
}
impl Debug for SessionTeardown {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionTeardown")
			.field("last_cycle", &self.last_cycle.load(Ordering::Relaxed))
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{RecordingNavigator, token_expiring_in},
		auth::TokenSecret,
		signal::SessionState,
	};

	fn failure(cycle: u64) -> RefreshFailure {
		RefreshFailure { cycle, error: Arc::new(Error::RefreshAbandoned) }
	}

	#[test]
	fn tears_down_once_per_cycle() {
		let store = TokenStore::in_memory();
		let navigator = Arc::new(RecordingNavigator::default());
		let teardown = SessionTeardown::new(store.clone(), navigator.clone());
		let mut states = store.subscribe();

		store
			.set(&TokenSecret::new(token_expiring_in("ada", Duration::minutes(5))), None)
			.expect("Seeding the store should succeed.");

		assert!(teardown.tear_down(&failure(1)));
		assert!(!teardown.tear_down(&failure(1)));
		assert!(store.get().is_none());
		assert_eq!(navigator.notices(), vec![SESSION_EXPIRED_NOTICE.to_owned()]);
		assert_eq!(
			states.drain(),
			vec![
				SessionState::Unauthenticated,
				SessionState::Authenticated,
				SessionState::Unauthenticated,
			],
		);

		assert!(teardown.tear_down(&failure(2)));
		assert!(!teardown.tear_down(&failure(1)));
		assert_eq!(navigator.notices().len(), 2);
	}
}
