//! JWT payload decoding and skew-aware expiry checks.
//!
//! Decoding never verifies signatures; the server remains the authority. These helpers only
//! read the payload segment so the client can avoid sending a token it already knows is
//! expired and can surface the signed-in user to callers.

// crates.io
use base64::{
	Engine, alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use serde::Deserializer;
// self
use crate::_prelude::*;

/// Clock skew applied by [`is_token_expired`] when callers have no better value.
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::seconds(5);

const JWT_SEGMENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decoded view of an access token payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtPayload {
	/// Subject identifier; accepts `sub` or `id`, string or number.
	#[serde(alias = "id", deserialize_with = "subject")]
	pub sub: String,
	/// Account email.
	#[serde(default)]
	pub email: String,
	/// Account role, e.g. `customer` or `admin`.
	#[serde(default)]
	pub role: String,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Avatar URL.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub avatar: Option<String>,
	/// Expiry as epoch seconds.
	pub exp: i64,
	/// Issued-at as epoch seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub iat: Option<i64>,
}
impl JwtPayload {
	/// Returns the expiry instant, or `None` when `exp` is outside the representable range.
	pub fn expires_at(&self) -> Option<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).ok()
	}

	/// Returns `true` when the payload expires at or before `now + skew`.
	pub fn is_expired_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		match (self.expires_at(), now.checked_add(skew)) {
			(Some(expires_at), Some(deadline)) => expires_at <= deadline,
			_ => true,
		}
	}
}

/// Decodes the payload segment of `token`.
///
/// Fails closed: malformed structure, base64, or JSON yields `None` instead of an error.
pub fn decode_token(token: &str) -> Option<JwtPayload> {
	let mut segments = token.split('.');
	let payload = match (segments.next(), segments.next()) {
		(Some(header), Some(payload)) if !header.is_empty() && !payload.is_empty() => payload,
		_ => return None,
	};
	let bytes = JWT_SEGMENT.decode(payload).ok()?;

	serde_json::from_slice(&bytes).ok()
}

/// Returns `true` when `token` cannot be decoded or expires within `skew` of the current
/// clock.
pub fn is_token_expired(token: &str, skew: Duration) -> bool {
	is_token_expired_at(token, OffsetDateTime::now_utc(), skew)
}

/// Clock-injectable variant of [`is_token_expired`].
pub fn is_token_expired_at(token: &str, now: OffsetDateTime, skew: Duration) -> bool {
	decode_token(token).is_none_or(|payload| payload.is_expired_at(now, skew))
}

fn subject<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Text(String),
		Number(serde_json::Number),
	}

	Ok(match Raw::deserialize(deserializer)? {
		Raw::Text(value) => value,
		Raw::Number(value) => value.to_string(),
	})
}
