//! Redacted bearer token wrapper.

// self
use crate::_prelude::*;

/// Access token presented as `Authorization: Bearer <token>`.
///
/// The value lives in memory only; formatting never reveals it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a raw token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Formats the value expected by the `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl From<String> for AccessToken {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for AccessToken {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
