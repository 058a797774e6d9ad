//! The access/refresh token pair held by the token store.

// self
use crate::{
	_prelude::*,
	auth::{Claims, DecodeError, TokenSecret, token::claims},
};

/// Access token plus the optional refresh token issued alongside it.
///
/// Only [`TokenStore`](crate::store::TokenStore) produces values of this type for live
/// sessions; consumers read a fresh copy on every use instead of holding one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	/// Short-lived bearer token presented on each request.
	pub access_token: TokenSecret,
	/// Longer-lived token used solely to obtain a new access token.
	pub refresh_token: Option<TokenSecret>,
}
impl Credential {
	/// Builds a credential from raw token strings.
	pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
		Self {
			access_token: TokenSecret::new(access_token),
			refresh_token: refresh_token.map(TokenSecret::new),
		}
	}

	/// Decodes the access token's claims.
	pub fn claims(&self) -> Result<Claims, DecodeError> {
		claims::decode(self.access_token.expose())
	}

	/// Seconds the access token has left at `now`.
	pub fn access_remaining_at(&self, now: OffsetDateTime) -> u64 {
		claims::remaining_seconds(self.access_token.expose(), now)
	}

	/// Seconds the refresh token has left at `now`; `0` when absent or opaque.
	pub fn refresh_remaining_at(&self, now: OffsetDateTime) -> u64 {
		self.refresh_token
			.as_ref()
			.map(|secret| claims::remaining_seconds(secret.expose(), now))
			.unwrap_or(0)
	}

	/// Returns `true` when the access token is expired (or undecodable) at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		claims::is_expired(self.access_token.expose(), now)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}
