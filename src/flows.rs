//! Session facade wiring the token store, auth endpoints, refresh coordinator, gatekeeper and
//! renewal timer over one transport.

pub mod gatekeeper;
pub mod refresh;
pub mod renewal;
pub mod teardown;

mod login;

pub use gatekeeper::*;
pub use refresh::*;
pub use renewal::*;
pub use teardown::*;

// self
use crate::{
	_prelude::*,
	api::AuthApi,
	auth::Claims,
	config::SessionConfig,
	error::ConfigError,
	http::{HttpRequest, HttpResponse, HttpTransport},
	signal::SessionSubscription,
	store::{StorageBackend, TokenStore},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Session specialized for the crate's default reqwest transport.
pub type ReqwestSession = Session<ReqwestHttpClient>;

/// One user's session against a single API.
///
/// The session owns the [`TokenStore`] handle and hands clones of it to the components that
/// need it; none of them keeps a credential of its own. Every protected call goes through
/// [`Session::send`], and every refresh, whether triggered by a 401 or by a
/// [`RenewalTimer`], goes through the same [`RefreshCoordinator`].
pub struct Session<C>
where
	C: ?Sized + HttpTransport,
{
	config: SessionConfig,
	store: TokenStore,
	api: AuthApi<C>,
	coordinator: RefreshCoordinator<C>,
	gatekeeper: Gatekeeper<C>,
	teardown: SessionTeardown,
}
impl<C> Session<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a session that reuses the caller-provided transport.
	pub fn with_http_client(
		config: SessionConfig,
		backend: Arc<dyn StorageBackend>,
		http_client: impl Into<Arc<C>>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self, ConfigError> {
		let http_client = http_client.into();
		let store = TokenStore::new(backend, config.storage_keys.clone());
		let api = AuthApi::new(&config, http_client.clone())?;
		let coordinator = RefreshCoordinator::new(api.clone(), store.clone());
		let teardown = SessionTeardown::new(store.clone(), navigator);
		let gatekeeper =
			Gatekeeper::new(http_client, store.clone(), coordinator.clone(), teardown.clone());

		Ok(Self { config, store, api, coordinator, gatekeeper, teardown })
	}

	/// Configuration the session was built with.
	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	/// The session's token store.
	pub fn store(&self) -> &TokenStore {
		&self.store
	}

	/// Direct access to the auth endpoints.
	pub fn api(&self) -> &AuthApi<C> {
		&self.api
	}

	/// The coordinator shared by every refresh trigger.
	pub fn coordinator(&self) -> &RefreshCoordinator<C> {
		&self.coordinator
	}

	/// The gatekeeper protected calls go through.
	pub fn gatekeeper(&self) -> &Gatekeeper<C> {
		&self.gatekeeper
	}

	/// Returns `true` when a non-expired access token is stored.
	pub fn is_logged_in(&self) -> bool {
		self.store.session_state().is_authenticated()
	}

	/// Claims of the stored access token; `None` when absent or undecodable.
	pub fn claims(&self) -> Option<Claims> {
		self.store.get()?.claims().ok()
	}

	/// Role claim of the stored access token.
	pub fn role(&self) -> Option<String> {
		self.claims()?.role
	}

	/// Subscribes to login-state changes.
	pub fn subscribe(&self) -> SessionSubscription {
		self.store.subscribe()
	}

	/// Sends a protected request, refreshing and replaying once on 401.
	pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
		self.gatekeeper.send(request).await
	}

	/// Returns whether an account exists for `email`.
	pub async fn check_email(&self, email: &str) -> Result<bool> {
		self.api.check_email(email).await
	}

	/// Starts a renewal timer for this session. Dropping the timer stops it.
	///
	/// Must be called from within a tokio runtime.
	pub fn start_renewal(&self) -> RenewalTimer<C> {
		RenewalTimer::start(
			&self.config,
			self.store.clone(),
			self.coordinator.clone(),
			self.teardown.clone(),
		)
	}
}
#[cfg(feature = "reqwest")]
impl Session<ReqwestHttpClient> {
	/// Creates a session with its own cookie-keeping reqwest transport.
	pub fn new(
		config: SessionConfig,
		backend: Arc<dyn StorageBackend>,
		navigator: Arc<dyn Navigator>,
	) -> Result<Self, ConfigError> {
		Self::with_http_client(config, backend, ReqwestHttpClient::new()?, navigator)
	}
}
impl<C> Clone for Session<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			store: self.store.clone(),
			api: self.api.clone(),
			coordinator: self.coordinator.clone(),
			gatekeeper: self.gatekeeper.clone(),
			teardown: self.teardown.clone(),
		}
	}
}
impl<C> Debug for Session<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Session")
			.field("api_base", &self.config.api_base.as_str())
			.field("store", &self.store)
			.field("coordinator", &self.coordinator)
			.finish()
	}
}
