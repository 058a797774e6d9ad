//! Unverified token payload decoding and expiry arithmetic.
//!
//! Signatures are never checked here; the issuing server stays the arbiter of validity. Every
//! helper fails closed, so a token that cannot be decoded counts as expired.

// crates.io
use base64::{
	Engine,
	engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD},
};
// self
use crate::_prelude::*;

/// Errors raised while decoding a token payload.
#[derive(Debug, ThisError)]
pub enum DecodeError {
	/// The token does not have the `header.payload.signature` shape.
	#[error("Token has {segments} segment(s); at least three are required.")]
	Malformed {
		/// Number of `.`-separated segments found.
		segments: usize,
	},
	/// The payload segment is not base64.
	#[error("Token payload is not valid base64.")]
	Base64(#[from] base64::DecodeError),
	/// The payload decoded but is not a claims object.
	#[error("Token payload is not a valid claims object.")]
	Payload(#[from] serde_path_to_error::Error<serde_json::Error>),
}

/// Claims carried in an access token's payload segment.
///
/// Claims are derived on demand and must not be cached: the token behind them can be replaced
/// at any time. Only `exp` is required; a missing `sub` reads as empty and a `role` that is not
/// a string (or a list whose first entry is one) reads as absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
	/// Subject the token was issued to (`sub`).
	#[serde(rename = "sub", default)]
	pub subject: String,
	/// Role granted to the subject, when the issuer includes one.
	#[serde(default, deserialize_with = "lenient_role", skip_serializing_if = "Option::is_none")]
	pub role: Option<String>,
	/// Expiry in seconds since the Unix epoch (`exp`).
	#[serde(rename = "exp")]
	pub expires_at: f64,
}
impl Claims {
	/// Whole seconds left before expiry at `now`, clamped at zero.
	pub fn remaining_seconds_at(&self, now: OffsetDateTime) -> u64 {
		seconds_until(self.expires_at, now)
	}

	/// Returns `true` once no whole second of lifetime remains at `now`.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
		self.remaining_seconds_at(now) == 0
	}
}

#[derive(Deserialize)]
struct Expiry {
	exp: f64,
}

/// Decodes the claims of `token` without verifying its signature.
///
/// The payload may use either the URL-safe or the standard base64 alphabet, with or without
/// padding.
pub fn decode(token: &str) -> Result<Claims, DecodeError> {
	parse_payload(token)
}

/// Seconds of lifetime `token` has left at `now`; `0` when it carries no readable `exp`.
pub fn remaining_seconds(token: &str, now: OffsetDateTime) -> u64 {
	parse_payload::<Expiry>(token).map(|expiry| seconds_until(expiry.exp, now)).unwrap_or(0)
}

/// Returns `true` when `token` is expired at `now` or cannot be decoded.
pub fn is_expired(token: &str, now: OffsetDateTime) -> bool {
	remaining_seconds(token, now) == 0
}

fn parse_payload<T>(token: &str) -> Result<T, DecodeError>
where
	T: for<'de> Deserialize<'de>,
{
	let segments = token.split('.').count();

	if segments < 3 {
		return Err(DecodeError::Malformed { segments });
	}

	let payload = token.split('.').nth(1).unwrap_or_default().trim_end_matches('=');
	let bytes = URL_SAFE_NO_PAD.decode(payload).or_else(|_| STANDARD_NO_PAD.decode(payload))?;
	let mut deserializer = serde_json::Deserializer::from_slice(&bytes);

	Ok(serde_path_to_error::deserialize(&mut deserializer)?)
}

fn seconds_until(expires_at: f64, now: OffsetDateTime) -> u64 {
	// Subtract whole seconds first so integral `exp` values stay exact.
	let whole = expires_at - now.unix_timestamp() as f64;
	let delta = whole - f64::from(now.nanosecond()) / 1_000_000_000.;

	if delta.is_nan() || delta <= 0. { 0 } else { delta.floor() as u64 }
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	let role = match serde_json::Value::deserialize(deserializer)? {
		serde_json::Value::String(role) => Some(role),
		serde_json::Value::Array(roles) =>
			roles.into_iter().next().and_then(|role| role.as_str().map(str::to_owned)),
		_ => None,
	};

	Ok(role)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;
	use crate::_preludet::mint_token;

	#[test]
	fn decode_reads_subject_role_and_expiry() {
		let token = mint_token("ada@example.com", Some("ROLE_MANAGER"), 1_750_000_000);
		let claims = decode(&token).expect("Minted token should decode.");

		assert_eq!(claims.subject, "ada@example.com");
		assert_eq!(claims.role.as_deref(), Some("ROLE_MANAGER"));
		assert_eq!(claims.expires_at, 1_750_000_000.);
	}

	#[test]
	fn decode_accepts_standard_alphabet_with_padding() {
		let payload = base64::engine::general_purpose::STANDARD
			.encode(br#"{"sub":"x?>","exp":10}"#);
		let token = format!("h.{payload}.s");
		let claims = decode(&token).expect("Padded standard base64 should decode.");

		assert_eq!(claims.subject, "x?>");
		assert!(claims.role.is_none());
	}

	#[test]
	fn decode_rejects_malformed_tokens() {
		assert!(matches!(decode(""), Err(DecodeError::Malformed { segments: 1 })));
		assert!(matches!(decode("a.b"), Err(DecodeError::Malformed { segments: 2 })));
		assert!(matches!(decode("a.@@@.c"), Err(DecodeError::Base64(_))));

		let not_json = URL_SAFE_NO_PAD.encode(b"plain text");

		assert!(matches!(decode(&format!("a.{not_json}.c")), Err(DecodeError::Payload(_))));

		let missing_exp = URL_SAFE_NO_PAD.encode(br#"{"sub":"nobody"}"#);
		let err = decode(&format!("a.{missing_exp}.c"))
			.expect_err("Claims without an expiry should be rejected.");

		assert!(err.to_string().contains("claims"));
	}

	#[test]
	fn expiry_only_needs_exp() {
		let expiry = macros::datetime!(2025-06-01 12:00 UTC);
		let exp_only = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, expiry.unix_timestamp()));
		let token = format!("h.{exp_only}.s");
		let now = expiry - Duration::minutes(10);

		assert_eq!(remaining_seconds(&token, now), 600);
		assert!(!is_expired(&token, now));

		let claims = decode(&token).expect("Tokens without a subject should decode.");

		assert!(claims.subject.is_empty());
		assert!(claims.role.is_none());
	}

	#[test]
	fn non_string_roles_do_not_expire_the_token() {
		let expiry = macros::datetime!(2025-06-01 12:00 UTC);
		let now = expiry - Duration::minutes(10);
		let token_with = |role: &str| {
			let payload = URL_SAFE_NO_PAD.encode(format!(
				r#"{{"sub":"a","role":{role},"exp":{}}}"#,
				expiry.unix_timestamp()
			));

			format!("h.{payload}.s")
		};
		let listed = token_with(r#"["ADMIN","USER"]"#);
		let numeric = token_with("7");

		assert_eq!(remaining_seconds(&listed, now), 600);
		assert_eq!(remaining_seconds(&numeric, now), 600);
		assert_eq!(
			decode(&listed).expect("Listed roles should decode.").role.as_deref(),
			Some("ADMIN")
		);
		assert_eq!(decode(&numeric).expect("Numeric roles should decode.").role, None);
	}

	#[test]
	fn expiry_boundary_matches_whole_seconds() {
		let expiry = macros::datetime!(2025-06-01 12:00 UTC);
		let token = mint_token("user", None, expiry.unix_timestamp());

		assert_eq!(remaining_seconds(&token, expiry - Duration::seconds(1)), 1);
		assert!(!is_expired(&token, expiry - Duration::seconds(1)));
		assert_eq!(remaining_seconds(&token, expiry), 0);
		assert!(is_expired(&token, expiry));
		assert_eq!(remaining_seconds(&token, expiry + Duration::hours(3)), 0);
	}

	#[test]
	fn remaining_seconds_decreases_until_expiry() {
		let expiry = macros::datetime!(2025-06-01 12:00 UTC);
		let token = mint_token("user", None, expiry.unix_timestamp());
		let mut previous = u64::MAX;

		for offset in (0..=30).rev() {
			let remaining = remaining_seconds(&token, expiry - Duration::seconds(offset));

			assert!(remaining < previous || remaining == 0);
			assert_eq!(remaining, offset as u64);

			previous = remaining;
		}
	}

	#[test]
	fn fractional_now_rounds_down() {
		let expiry = macros::datetime!(2025-06-01 12:00 UTC);
		let token = mint_token("user", None, expiry.unix_timestamp());

		assert_eq!(remaining_seconds(&token, expiry - Duration::milliseconds(1_500)), 1);
		assert_eq!(remaining_seconds(&token, expiry - Duration::milliseconds(500)), 0);
	}

	#[test]
	fn undecodable_tokens_fail_closed() {
		let now = OffsetDateTime::now_utc();

		assert_eq!(remaining_seconds("opaque-refresh-token", now), 0);
		assert!(is_expired("opaque-refresh-token", now));
	}
}
