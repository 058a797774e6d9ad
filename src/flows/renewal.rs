//! Proactive renewal of the access token while a caller keeps the timer alive.
//!
//! The timer re-reads the stored credential on a fixed period, publishes a [`TokenDisplay`]
//! snapshot, and asks the [`RefreshCoordinator`] for a new token once the access token's
//! remaining lifetime drops to the configured lead time. It backs off when a refresh is
//! already running, whether its own (a local flag) or anyone else's (the coordinator).

// crates.io
use tokio::{
	sync::watch,
	time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	config::SessionConfig,
	flows::{RefreshCoordinator, RefreshOutcome, SessionTeardown},
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::TokenStore,
};

/// Snapshot of the stored credential's lifetime, refreshed on every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TokenDisplay {
	/// Seconds the access token has left.
	pub access_remaining: u64,
	/// Seconds the refresh token has left; `0` when absent or opaque.
	pub refresh_remaining: u64,
	/// Share of the access token's lifetime already used, rounded, `100` once expired.
	///
	/// The lifetime is measured from the first tick that saw the current token.
	pub access_usage_percent: u8,
	/// Whether the latest refresh by this timer replaced the access token.
	pub token_changed: bool,
}

/// Handle to a running renewal task. Dropping the handle stops the task.
///
/// A tick that finds the store empty publishes a zeroed [`TokenDisplay`] and never refreshes;
/// renewal resumes once a credential is stored again.
pub struct RenewalTimer<C>
where
	C: ?Sized + HttpTransport,
{
	core: Arc<TimerCore<C>>,
}
impl<C> RenewalTimer<C>
where
	C: ?Sized + HttpTransport,
{
	const MIN_PERIOD: Duration = Duration::MILLISECOND;

	/// Spawns the renewal task using the period and lead time from `config`.
	///
	/// Must be called from within a tokio runtime. The first tick fires immediately. Periods
	/// shorter than a millisecond, including zero or negative ones, tick every millisecond.
	pub fn start(
		config: &SessionConfig,
		store: TokenStore,
		coordinator: RefreshCoordinator<C>,
		teardown: SessionTeardown,
	) -> Self {
		let (display, _) = watch::channel(TokenDisplay::default());
		let core = Arc::new(TimerCore {
			store,
			coordinator,
			teardown,
			lead_time: u64::try_from(config.renewal_lead_time.whole_seconds()).unwrap_or(0),
			refreshing: AtomicBool::new(false),
			display,
			baseline: Mutex::new(None),
			cancel: CancellationToken::new(),
		});

		let period = config.renewal_period.max(Self::MIN_PERIOD);

		tokio::spawn(core.clone().run(period.unsigned_abs()));

		Self { core }
	}

	/// Refreshes immediately, regardless of the remaining lifetime.
	///
	/// Returns `None` without doing anything while this timer is already refreshing or after
	/// it stopped.
	pub async fn refresh_now(&self) -> Option<RefreshOutcome> {
		self.core.refresh().await
	}

	/// Latest display snapshot.
	pub fn display(&self) -> TokenDisplay {
		*self.core.display.borrow()
	}

	/// Receiver notified on every display update.
	pub fn subscribe_display(&self) -> watch::Receiver<TokenDisplay> {
		self.core.display.subscribe()
	}

	/// Returns `true` while a refresh started by this timer is outstanding.
	pub fn is_refreshing(&self) -> bool {
		self.core.refreshing.load(Ordering::Acquire)
	}

	/// Returns `false` once the timer was stopped or tore the session down.
	pub fn is_running(&self) -> bool {
		!self.core.cancel.is_cancelled()
	}

	/// Stops ticking. A refresh already issued still runs to completion.
	pub fn stop(&self) {
		self.core.cancel.cancel();
	}

	/// Resolves once the timer has stopped.
	pub async fn stopped(&self) {
		self.core.cancel.cancelled().await;
	}
}
impl<C> Drop for RenewalTimer<C>
where
	C: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		self.stop();
	}
}
impl<C> Debug for RenewalTimer<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RenewalTimer")
			.field("display", &self.display())
			.field("refreshing", &self.is_refreshing())
			.field("running", &self.is_running())
			.finish()
	}
}

struct Baseline {
	token: TokenSecret,
	lifetime: u64,
}

struct TimerCore<C>
where
	C: ?Sized + HttpTransport,
{
	store: TokenStore,
	coordinator: RefreshCoordinator<C>,
	teardown: SessionTeardown,
	lead_time: u64,
	refreshing: AtomicBool,
	display: watch::Sender<TokenDisplay>,
	baseline: Mutex<Option<Baseline>>,
	cancel: CancellationToken,
}
impl<C> TimerCore<C>
where
	C: ?Sized + HttpTransport,
{
	async fn run(self: Arc<Self>, period: std::time::Duration) {
		let mut ticks = time::interval(period);

		ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = self.cancel.cancelled() => break,
				_ = ticks.tick() => {},
			}

			self.tick().await;
		}

		obs::debug_flow(FlowKind::Renewal, "renewal timer stopped");
	}

	async fn tick(&self) {
		let now = OffsetDateTime::now_utc();
		// An empty store means the session already ended; there is nothing to renew.
		let Some(credential) = self.store.get() else {
			self.publish(None, now, None);

			return;
		};

		self.publish(Some(&credential), now, None);

		if credential.access_remaining_at(now) <= self.lead_time
			&& !self.coordinator.is_in_flight()
		{
			FlowSpan::new(FlowKind::Renewal, "tick").instrument(self.refresh()).await;
		}
	}

	async fn refresh(&self) -> Option<RefreshOutcome> {
		const KIND: FlowKind = FlowKind::Renewal;

		if self.cancel.is_cancelled() || self.refreshing.swap(true, Ordering::AcqRel) {
			return None;
		}

		let _flag = RefreshingFlag(&self.refreshing);
		let previous = self.store.access_token();

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let outcome = self.coordinator.request_token().await;
		let now = OffsetDateTime::now_utc();

		match &outcome {
			RefreshOutcome::Fresh(token) => {
				let changed = previous.as_ref() != Some(token);

				obs::record_flow_outcome(KIND, FlowOutcome::Success);
				self.publish(self.store.get().as_ref(), now, Some(changed));
			},
			RefreshOutcome::Failed(failure) => {
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);
				self.teardown.tear_down(failure);
				self.cancel.cancel();
				self.publish(None, now, Some(false));
			},
		}

		Some(outcome)
	}

	fn publish(&self, credential: Option<&Credential>, now: OffsetDateTime, changed: Option<bool>) {
		let access_remaining = credential.map_or(0, |c| c.access_remaining_at(now));
		let refresh_remaining = credential.map_or(0, |c| c.refresh_remaining_at(now));
		let access_usage_percent =
			self.usage_percent(credential.map(|c| &c.access_token), access_remaining);

		self.display.send_modify(|display| {
			display.access_remaining = access_remaining;
			display.refresh_remaining = refresh_remaining;
			display.access_usage_percent = access_usage_percent;

			if let Some(changed) = changed {
				display.token_changed = changed;
			}
		});
	}

	fn usage_percent(&self, token: Option<&TokenSecret>, remaining: u64) -> u8 {
		let Some(token) = token.filter(|_| remaining > 0) else {
			return 100;
		};
		let mut baseline = self.baseline.lock();
		let lifetime = match &*baseline {
			Some(seen) if &seen.token == token => seen.lifetime,
			_ => {
				*baseline = Some(Baseline { token: token.clone(), lifetime: remaining });

				remaining
			},
		};
		let used = lifetime.saturating_sub(remaining);

		u8::try_from(((used * 100 + lifetime / 2) / lifetime).min(100)).unwrap_or(100)
	}
}

struct RefreshingFlag<'a>(&'a AtomicBool);
impl Drop for RefreshingFlag<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::{
		_preludet::{
			RecordingNavigator, ScriptedTransport, json_response, test_config, token_expiring_in,
		},
		api::AuthApi,
		flows::SESSION_EXPIRED_NOTICE,
	};

	struct Fixture {
		timer: RenewalTimer<ScriptedTransport>,
		transport: Arc<ScriptedTransport>,
		store: TokenStore,
		navigator: Arc<RecordingNavigator>,
	}

	fn fixture(transport: ScriptedTransport, access: &str, lead_time: Duration) -> Fixture {
		let config = test_config("https://api.example.com/").with_renewal_lead_time(lead_time);

		fixture_with(&config, transport, access)
	}

	fn fixture_with(config: &SessionConfig, transport: ScriptedTransport, access: &str) -> Fixture {
		let transport = Arc::new(transport);
		let store = TokenStore::in_memory();
		let navigator = Arc::new(RecordingNavigator::default());
		let api =
			AuthApi::new(&config, transport.clone()).expect("Fixture endpoints should resolve.");
		let coordinator = RefreshCoordinator::new(api, store.clone());
		let teardown = SessionTeardown::new(store.clone(), navigator.clone());

		store.set(&TokenSecret::new(access), None).expect("Seeding should succeed.");

		let timer = RenewalTimer::start(config, store.clone(), coordinator, teardown);

		Fixture { timer, transport, store, navigator }
	}

	fn refresh_with(token: String) -> ScriptedTransport {
		let body = json!({ "token": token });

		ScriptedTransport::new(move |_| Ok(json_response(200, &body)))
	}

	#[tokio::test(start_paused = true)]
	async fn expired_token_is_renewed_on_first_tick() {
		let fresh = token_expiring_in("ada", Duration::minutes(10));
		let Fixture { timer, transport, store, .. } = fixture(
			refresh_with(fresh.clone()),
			&token_expiring_in("ada", Duration::minutes(-1)),
			Duration::ZERO,
		);
		let snapshot = *timer
			.subscribe_display()
			.wait_for(|display| display.token_changed)
			.await
			.expect("Timer should keep publishing.");

		assert!(snapshot.access_remaining > 590);
		assert_eq!(snapshot.access_usage_percent, 0);
		assert_eq!(store.access_token().map(|token| token.expose().to_owned()), Some(fresh));
		assert_eq!(transport.count("auth/refresh"), 1);
		assert!(!timer.is_refreshing());
	}

	#[tokio::test(start_paused = true)]
	async fn live_token_is_left_alone_until_lead_time() {
		let Fixture { timer, transport, .. } = fixture(
			refresh_with(token_expiring_in("ada", Duration::minutes(10))),
			&token_expiring_in("ada", Duration::minutes(10)),
			Duration::ZERO,
		);

		time::sleep(std::time::Duration::from_secs(5)).await;

		let display = timer.display();

		assert_eq!(transport.count("auth/refresh"), 0);
		assert!(display.access_remaining > 590);
		assert!(!display.token_changed);
		assert!(timer.is_running());
	}

	#[tokio::test(start_paused = true)]
	async fn lead_time_triggers_early_refresh() {
		let Fixture { timer, transport, .. } = fixture(
			refresh_with(token_expiring_in("ada", Duration::minutes(10))),
			&token_expiring_in("ada", Duration::seconds(30)),
			Duration::minutes(1),
		);

		timer
			.subscribe_display()
			.wait_for(|display| display.token_changed)
			.await
			.expect("Timer should keep publishing.");

		assert_eq!(transport.count("auth/refresh"), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn failed_renewal_tears_down_and_stops() {
		let Fixture { timer, transport, store, navigator } = fixture(
			ScriptedTransport::new(|_| Ok(json_response(200, &json!({})))),
			&token_expiring_in("ada", Duration::minutes(-1)),
			Duration::ZERO,
		);

		timer.stopped().await;
		time::sleep(std::time::Duration::from_secs(5)).await;

		assert!(!timer.is_running());
		assert!(store.get().is_none());
		assert_eq!(navigator.notices(), vec![SESSION_EXPIRED_NOTICE.to_owned()]);
		assert_eq!(transport.count("auth/refresh"), 1);
		assert_eq!(timer.display().access_usage_percent, 100);
	}

	#[tokio::test(start_paused = true)]
	async fn zero_period_still_ticks_and_renews() {
		let mut config = test_config("https://api.example.com/");

		config.renewal_period = Duration::ZERO;

		let Fixture { timer, transport, .. } = fixture_with(
			&config,
			refresh_with(token_expiring_in("ada", Duration::minutes(10))),
			&token_expiring_in("ada", Duration::minutes(-1)),
		);

		timer
			.subscribe_display()
			.wait_for(|display| display.token_changed)
			.await
			.expect("Timer should keep publishing.");
		time::sleep(std::time::Duration::from_millis(50)).await;

		assert!(timer.is_running());
		assert_eq!(transport.count("auth/refresh"), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn empty_store_publishes_without_refreshing() {
		let Fixture { timer, transport, store, navigator } = fixture(
			refresh_with(token_expiring_in("ada", Duration::minutes(10))),
			&token_expiring_in("ada", Duration::minutes(10)),
			Duration::ZERO,
		);

		store.clear().expect("Clearing should succeed.");
		time::sleep(std::time::Duration::from_secs(5)).await;

		assert!(timer.is_running());
		assert_eq!(timer.display().access_remaining, 0);
		assert_eq!(timer.display().access_usage_percent, 100);
		assert_eq!(transport.count("auth/refresh"), 0);
		assert!(navigator.notices().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn manual_refresh_is_ignored_while_one_is_running() {
		let current = token_expiring_in("ada", Duration::minutes(10));
		let Fixture { timer, transport, .. } = fixture(
			refresh_with(token_expiring_in("ada", Duration::minutes(15))).hold_refresh(),
			&current,
			Duration::ZERO,
		);
		let (first, second) = tokio::join!(timer.refresh_now(), async {
			let skipped = timer.refresh_now().await;

			transport.release_refresh();

			skipped
		});

		assert!(first.is_some_and(|outcome| outcome.is_fresh()));
		assert!(second.is_none());
		assert!(timer.display().token_changed);
		assert!(!timer.is_refreshing());
		assert_eq!(transport.count("auth/refresh"), 1);
	}

	#[test]
	fn usage_percent_tracks_baseline_per_token() {
		let store = TokenStore::in_memory();
		let transport = Arc::new(ScriptedTransport::new(|_| Ok(json_response(200, &json!({})))));
		let api: AuthApi<ScriptedTransport> =
			AuthApi::new(&test_config("https://api.example.com/"), transport)
				.expect("Fixture endpoints should resolve.");
		let core = TimerCore {
			store: store.clone(),
			coordinator: RefreshCoordinator::new(api, store.clone()),
			teardown: SessionTeardown::new(store, Arc::new(RecordingNavigator::default())),
			lead_time: 0,
			refreshing: AtomicBool::new(false),
			display: watch::channel(TokenDisplay::default()).0,
			baseline: Mutex::new(None),
			cancel: CancellationToken::new(),
		};
		let first = TokenSecret::new("first");
		let second = TokenSecret::new("second");

		assert_eq!(core.usage_percent(Some(&first), 200), 0);
		assert_eq!(core.usage_percent(Some(&first), 150), 25);
		assert_eq!(core.usage_percent(Some(&first), 1), 100);
		assert_eq!(core.usage_percent(Some(&first), 0), 100);
		assert_eq!(core.usage_percent(Some(&second), 60), 0);
		assert_eq!(core.usage_percent(None, 60), 100);
	}
}
