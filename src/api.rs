//! Calls to the external auth endpoints and normalization of their responses.
//!
//! Endpoint contracts:
//!
//! - `POST auth/login {email, password}` → `{token, refreshToken?}`
//! - `POST auth/refresh {}` → `{token}`; the refresh credential travels at the transport level
//! - `POST auth/logout {}`
//! - `GET auth/check-email?email=…` → `{exists}`
//!
//! Token-bearing responses are normalized leniently: an object with a non-empty `token` string
//! or a bare JSON string both count, anything else is "no token".

// crates.io
use http::{
	Method, StatusCode,
	header::{ACCEPT, CONTENT_TYPE},
};
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	config::SessionConfig,
	error::ConfigError,
	http::{HttpRequest, HttpResponse, HttpTransport, attach_bearer},
};

/// Endpoint label used in errors and spans for `auth/login`.
pub const LOGIN: &str = "login";
/// Endpoint label used in errors and spans for `auth/refresh`.
pub const REFRESH: &str = "refresh";
/// Endpoint label used in errors and spans for `auth/logout`.
pub const LOGOUT: &str = "logout";
/// Endpoint label used in errors and spans for `auth/check-email`.
pub const CHECK_EMAIL: &str = "check_email";

/// Client for the auth endpoints, bound to one API base and transport.
pub struct AuthApi<C>
where
	C: ?Sized + HttpTransport,
{
	http_client: Arc<C>,
	endpoints: Arc<Endpoints>,
}
impl<C> AuthApi<C>
where
	C: ?Sized + HttpTransport,
{
	/// Resolves every endpoint against `config.api_base`.
	pub fn new(
		config: &SessionConfig,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self, ConfigError> {
		let endpoints = Endpoints {
			login: config.endpoint("auth/login")?,
			refresh: config.endpoint("auth/refresh")?,
			logout: config.endpoint("auth/logout")?,
			check_email: config.endpoint("auth/check-email")?,
		};

		Ok(Self { http_client: http_client.into(), endpoints: Arc::new(endpoints) })
	}

	/// Transport shared with the rest of the session.
	pub fn http_client(&self) -> &Arc<C> {
		&self.http_client
	}

	/// Exchanges email and password for a credential.
	pub async fn login(&self, email: &str, password: &str) -> Result<Credential> {
		let body =
			serde_json::to_vec(&LoginRequest { email, password }).map_err(ConfigError::from)?;
		let request = json_request(Method::POST, &self.endpoints.login, body, None)?;
		let response = self.send(LOGIN, request).await?;

		extract_credential(response.body()).ok_or(Error::NoTokenInResponse { endpoint: LOGIN })
	}

	/// Asks the refresh endpoint for a new access token.
	///
	/// The returned credential carries a refresh token only when the endpoint rotated it.
	pub async fn refresh(&self) -> Result<Credential> {
		let request = json_request(Method::POST, &self.endpoints.refresh, b"{}".to_vec(), None)?;
		let response = self.send(REFRESH, request).await?;

		extract_credential(response.body()).ok_or(Error::NoTokenInResponse { endpoint: REFRESH })
	}

	/// Tells the server the session is over. Callers treat failures as best effort.
	pub async fn logout(&self, bearer: Option<&TokenSecret>) -> Result<()> {
		let request = json_request(Method::POST, &self.endpoints.logout, b"{}".to_vec(), bearer)?;

		self.send(LOGOUT, request).await.map(|_| ())
	}

	/// Returns whether an account exists for `email`.
	pub async fn check_email(&self, email: &str) -> Result<bool> {
		let mut url = self.endpoints.check_email.clone();

		url.query_pairs_mut().append_pair("email", email);

		let request = json_request(Method::GET, &url, Vec::new(), None)?;
		let response = self.send(CHECK_EMAIL, request).await?;
		let mut deserializer = serde_json::Deserializer::from_slice(response.body());
		let check: EmailCheck = serde_path_to_error::deserialize(&mut deserializer).map_err(
			|source| Error::ResponseParse {
				endpoint: CHECK_EMAIL,
				status: response.status().as_u16(),
				source,
			},
		)?;

		Ok(check.exists)
	}

	async fn send(&self, endpoint: &'static str, request: HttpRequest) -> Result<HttpResponse> {
		let response = self.http_client.execute(request).await?;
		let status = response.status();

		if !status.is_success() {
			return Err(Error::Rejected { endpoint, status: status.as_u16() });
		}

		Ok(response)
	}
}
impl<C> Clone for AuthApi<C>
where
	C: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { http_client: self.http_client.clone(), endpoints: self.endpoints.clone() }
	}
}
impl<C> Debug for AuthApi<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthApi").field("endpoints", &self.endpoints).finish()
	}
}

#[derive(Debug)]
struct Endpoints {
	login: Url,
	refresh: Url,
	logout: Url,
	check_email: Url,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
	email: &'a str,
	password: &'a str,
}

#[derive(Deserialize)]
struct EmailCheck {
	exists: bool,
}

/// Pulls a credential out of a token-bearing response body.
///
/// Accepts `{"token": "…", "refreshToken": "…"?}` or a bare JSON string; empty tokens and any
/// other shape yield `None`.
pub fn extract_credential(body: &[u8]) -> Option<Credential> {
	let non_empty =
		|value: &Value| value.as_str().filter(|token| !token.is_empty()).map(str::to_owned);

	match serde_json::from_slice::<Value>(body).ok()? {
		value @ Value::String(_) => non_empty(&value).map(|token| Credential::new(token, None)),
		Value::Object(fields) => {
			let token = fields.get("token").and_then(non_empty)?;
			let refresh = fields.get("refreshToken").and_then(non_empty);

			Some(Credential::new(token, refresh))
		},
		_ => None,
	}
}

fn json_request(
	method: Method,
	url: &Url,
	body: Vec<u8>,
	bearer: Option<&TokenSecret>,
) -> Result<HttpRequest> {
	let mut builder = http::Request::builder()
		.method(method)
		.uri(url.as_str())
		.header(ACCEPT, "application/json");

	if !body.is_empty() {
		builder = builder.header(CONTENT_TYPE, "application/json");
	}

	let request = builder.body(body).map_err(ConfigError::from)?;

	match bearer {
		Some(token) => Ok(attach_bearer(request, token)?),
		None => Ok(request),
	}
}

/// Returns `true` for responses the gatekeeper treats as an authorization failure.
pub fn is_authorization_failure(response: &HttpResponse) -> bool {
	response.status() == StatusCode::UNAUTHORIZED
}
