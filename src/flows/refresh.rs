//! Single-flight refresh of the access token.
//!
//! [`RefreshCoordinator`] is a two-phase state machine. While idle, the first caller of
//! [`RefreshCoordinator::request_token`] opens a cycle and spawns the one refresh call for it;
//! callers arriving while that cycle is in flight queue up behind it and issue nothing. When
//! the call resolves, the store is updated first, the coordinator returns to idle, and then
//! every queued caller receives the same [`RefreshOutcome`] in arrival order.
//!
//! The cycle runs on its own task, so a caller that stops polling cannot strand the others and
//! an issued refresh always runs to completion.

mod metrics;

pub use metrics::RefreshMetrics;

// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	api::AuthApi,
	auth::TokenSecret,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// Result handed to every caller of one refresh cycle.
#[derive(Clone, Debug)]
pub enum RefreshOutcome {
	/// The refresh succeeded and the new access token is already stored.
	Fresh(TokenSecret),
	/// The refresh failed; nothing was stored.
	Failed(RefreshFailure),
}
impl RefreshOutcome {
	/// Returns the fresh access token, if any.
	pub fn token(&self) -> Option<&TokenSecret> {
		match self {
			Self::Fresh(token) => Some(token),
			Self::Failed(_) => None,
		}
	}

	/// Returns `true` for [`RefreshOutcome::Fresh`].
	pub fn is_fresh(&self) -> bool {
		matches!(self, Self::Fresh(_))
	}

	fn abandoned(cycle: u64) -> Self {
		Self::Failed(RefreshFailure { cycle, error: Arc::new(Error::RefreshAbandoned) })
	}
}

/// Failure shared by every waiter of a refresh cycle.
#[derive(Clone, Debug)]
pub struct RefreshFailure {
	/// Identifier of the cycle that failed; increases by one per cycle.
	pub cycle: u64,
	/// Why the refresh failed.
	pub error: Arc<Error>,
}

/// Serializes refresh attempts so at most one refresh call is outstanding.
pub struct RefreshCoordinator<C>(Arc<CoordinatorInner<C>>)
where
	C: ?Sized + HttpTransport;
impl<C> RefreshCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates an idle coordinator that refreshes through `api` and stores into `store`.
	pub fn new(api: AuthApi<C>, store: TokenStore) -> Self {
		Self(Arc::new(CoordinatorInner {
			api,
			store,
			phase: Mutex::new(RefreshPhase::Idle),
			metrics: RefreshMetrics::default(),
			cycles: AtomicU64::new(0),
		}))
	}

	/// Starts a refresh cycle, or joins the one in flight, and waits for its outcome.
	///
	/// Must be called from within a tokio runtime.
	pub async fn request_token(&self) -> RefreshOutcome {
		let (waiter, outcome) = oneshot::channel();
		let (cycle, opened) = self.0.enqueue(waiter);

		if opened {
			let inner = self.0.clone();

			tokio::spawn(async move { inner.run_cycle(cycle).await });
		}

		outcome.await.unwrap_or_else(|_| RefreshOutcome::abandoned(cycle))
	}

	/// Returns `true` while a refresh call is outstanding.
	pub fn is_in_flight(&self) -> bool {
		matches!(*self.0.phase.lock(), RefreshPhase::InFlight { .. })
	}

	/// Counters for cycles run by this coordinator.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.0.metrics
	}
}
impl<C> Clone for RefreshCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self(self.0.clone())
	}
}
impl<C> Debug for RefreshCoordinator<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("in_flight", &self.is_in_flight())
			.field("metrics", &self.0.metrics)
			.finish()
	}
}

enum RefreshPhase {
	Idle,
	InFlight { cycle: u64, waiters: VecDeque<oneshot::Sender<RefreshOutcome>> },
}

struct CoordinatorInner<C>
where
	C: ?Sized + HttpTransport,
{
	api: AuthApi<C>,
	store: TokenStore,
	phase: Mutex<RefreshPhase>,
	metrics: RefreshMetrics,
	cycles: AtomicU64,
}
impl<C> CoordinatorInner<C>
where
	C: ?Sized + HttpTransport,
{
	/// Queues `waiter` and reports its cycle plus whether this call opened it.
	fn enqueue(&self, waiter: oneshot::Sender<RefreshOutcome>) -> (u64, bool) {
		let mut phase = self.phase.lock();

		match &mut *phase {
			RefreshPhase::InFlight { cycle, waiters } => {
				waiters.push_back(waiter);
				self.metrics.record_join();

				(*cycle, false)
			},
			RefreshPhase::Idle => {
				let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;

				*phase = RefreshPhase::InFlight { cycle, waiters: VecDeque::from([waiter]) };

				(cycle, true)
			},
		}
	}

	async fn run_cycle(&self, cycle: u64) {
		const KIND: FlowKind = FlowKind::Refresh;

		let mut release = CycleRelease { inner: self, cycle, outcome: None };
		let span = FlowSpan::new(KIND, "run_cycle");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let outcome = match span.instrument(self.api.refresh()).await {
			Ok(credential) => {
				// The store keeps the credential readable even when persisting failed.
				if let Err(e) =
					self.store.set(&credential.access_token, credential.refresh_token.as_ref())
				{
					obs::warn_flow(KIND, "refreshed token could not be persisted", &e);
				}

				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				RefreshOutcome::Fresh(credential.access_token)
			},
			Err(e) => {
				obs::warn_flow(KIND, "token refresh failed", &e);
				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				RefreshOutcome::Failed(RefreshFailure { cycle, error: Arc::new(e) })
			},
		};

		release.outcome = Some(outcome);
	}

	fn release(&self, cycle: u64, outcome: RefreshOutcome) {
		let waiters = {
			let mut phase = self.phase.lock();

			match std::mem::replace(&mut *phase, RefreshPhase::Idle) {
				RefreshPhase::InFlight { cycle: current, waiters } if current == cycle => waiters,
				other => {
					*phase = other;

					return;
				},
			}
		};

		for waiter in waiters {
			// A waiter that stopped listening is fine to skip.
			let _ = waiter.send(outcome.clone());
		}
	}
}

/// Returns the coordinator to idle and resolves the waiters when the cycle task ends, even if
/// the task is dropped before the refresh call completes.
struct CycleRelease<'a, C>
where
	C: ?Sized + HttpTransport,
{
	inner: &'a CoordinatorInner<C>,
	cycle: u64,
	outcome: Option<RefreshOutcome>,
}
impl<C> Drop for CycleRelease<'_, C>
where
	C: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		let outcome = self.outcome.take().unwrap_or_else(|| RefreshOutcome::abandoned(self.cycle));

		self.inner.release(self.cycle, outcome);
	}
}
