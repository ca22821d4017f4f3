//! Crate-level error types shared across the session client, transports, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Server answered with a non-success status.
	#[error(transparent)]
	Status(#[from] StatusError),
	/// Session refresh failed; the session has been torn down.
	#[error(transparent)]
	Refresh(#[from] RefreshError),
	/// Response body could not be decoded into the requested type.
	#[error("Response body from {url} is not valid JSON for the requested type.")]
	Decode {
		/// Request URL.
		url: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// HTTP status carried by the error, when the server answered.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Status(e) => Some(e.status),
			Self::Refresh(RefreshError::Rejected { status }) => Some(*status),
			_ => None,
		}
	}

	/// Returns `true` for a `401 Unauthorized` answer.
	pub fn is_unauthorized(&self) -> bool {
		matches!(self, Self::Status(e) if e.is_unauthorized())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A path cannot be resolved against the API base URL.
	#[error("Path `{path}` cannot be resolved against the API base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The API base URL cannot act as a base for relative paths.
	#[error("The API base URL `{url}` cannot be a base.")]
	InvalidBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Navigation paths must be absolute.
	#[error("The {field} path must start with `/`: {path}.")]
	RelativePath {
		/// Configuration field name.
		field: &'static str,
		/// Offending path.
		path: String,
	},
	/// The hint storage key is empty.
	#[error("The session hint key must not be empty.")]
	EmptyHintKey,
	/// Timeouts must be positive.
	#[error("The {field} timeout must be positive.")]
	NonPositiveTimeout {
		/// Configuration field name.
		field: &'static str,
	},
	/// A header value cannot be encoded.
	#[error("Header value is invalid.")]
	InvalidHeader(#[from] http::header::InvalidHeaderValue),
	/// A JSON request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Body(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network errors and timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {url}.")]
	Network {
		/// Request URL.
		url: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request exceeded its configured timeout.
	#[error("Request to {url} timed out.")]
	Timeout {
		/// Request URL.
		url: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(url: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { url: url.into(), source: Box::new(src) }
	}
}

/// Non-success HTTP answer.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Request to {url} failed with HTTP {status}.")]
pub struct StatusError {
	/// HTTP status code.
	pub status: u16,
	/// Request URL.
	pub url: String,
	/// Leading part of the response body, for diagnostics.
	pub body_preview: String,
}
impl StatusError {
	const PREVIEW_LIMIT: usize = 512;

	/// Builds an error, truncating the body preview on a character boundary.
	pub fn new(status: u16, url: impl Into<String>, body: &[u8]) -> Self {
		let text = String::from_utf8_lossy(body);
		let body_preview = match text.char_indices().nth(Self::PREVIEW_LIMIT) {
			Some((idx, _)) => text[..idx].to_owned(),
			None => text.into_owned(),
		};

		Self { status, url: url.into(), body_preview }
	}

	/// Returns `true` for `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status == 401
	}
}

/// Refresh-call failures. Every variant ends the session.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the session with HTTP {status}.")]
	Rejected {
		/// HTTP status code.
		status: u16,
	},
	/// Refresh response carried neither `accessToken` nor `token`.
	#[error("Refresh response did not include an access token.")]
	MissingToken,
	/// Refresh response body was not valid JSON.
	#[error("Refresh response is malformed.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The refresh request never produced a response.
	#[error("Refresh request failed in transport.")]
	Transport(#[source] TransportError),
	/// The in-flight refresh this caller waited on failed.
	#[error("The in-flight session refresh failed.")]
	Abandoned,
	/// Refresh requires client storage, which this context lacks.
	#[error("Session refresh is unavailable without client storage.")]
	StorageUnavailable,
}
