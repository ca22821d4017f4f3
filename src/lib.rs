//! Bearer-token HTTP session client: in-memory tokens, single-flight refresh with replay
//! queues, and persisted session hints that keep anonymous clients off the refresh endpoint.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod nav;
pub mod obs;
pub mod session;
pub mod store;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// crates.io
	#[cfg(feature = "reqwest")] use reqwest::cookie::Jar;
	// self
	use crate::{
		auth::AccessToken,
		config::SessionConfig,
		http::SessionTransport,
		nav::MemoryNavigator,
		session::SessionClient,
		store::{HintStorage, MemoryStorage},
	};
	#[cfg(feature = "reqwest")]
	use crate::{http::ReqwestTransport, session::ReqwestSessionClient};

	/// Handles returned alongside a test client so assertions can inspect the injected ports.
	#[derive(Clone, Debug)]
	pub struct TestPorts {
		/// Storage backing the session hint.
		pub storage: Arc<MemoryStorage>,
		/// Navigator recording redirects.
		pub navigator: Arc<MemoryNavigator>,
	}

	/// Builds an unsigned JWT whose payload carries the provided subject and expiry.
	pub fn test_jwt(sub: &str, exp: i64) -> String {
		use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = serde_json::json!({
			"sub": sub,
			"email": format!("{sub}@shop.test"),
			"role": "customer",
			"exp": exp,
		});
		let payload = URL_SAFE_NO_PAD.encode(payload.to_string());

		format!("{header}.{payload}.signature")
	}

	/// Builds a JWT that expires one hour from now.
	pub fn fresh_test_jwt(sub: &str) -> AccessToken {
		let exp = (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp();

		AccessToken::new(test_jwt(sub, exp))
	}

	/// Constructs a [`SessionClient`] over any transport with in-memory storage and a navigator
	/// positioned at `path`.
	pub fn build_test_client<T>(
		config: SessionConfig,
		transport: T,
		path: &str,
	) -> (SessionClient<T>, TestPorts)
	where
		T: SessionTransport,
	{
		let storage = Arc::new(MemoryStorage::default());
		let navigator = Arc::new(MemoryNavigator::at(path));
		let hint_storage: Arc<dyn HintStorage> = storage.clone();
		let client =
			SessionClient::with_transport(config, transport, hint_storage, navigator.clone());

		(client, TestPorts { storage, navigator })
	}

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	#[cfg(feature = "reqwest")]
	pub fn test_reqwest_transport(config: &SessionConfig) -> ReqwestTransport {
		let jar = Arc::new(Jar::default());
		let client = ReqwestClient::builder()
			.cookie_provider(jar.clone())
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client, jar, config.api_base.clone())
	}

	/// Constructs a reqwest-backed [`SessionClient`] pointed at `base_url` with default
	/// configuration.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client(
		base_url: &str,
		path: &str,
	) -> (ReqwestSessionClient, TestPorts) {
		let base = Url::parse(base_url).expect("Test base URL should parse.");
		let config =
			SessionConfig::builder(base).build().expect("Test session config should build.");

		build_reqwest_test_client_with(config, path)
	}

	/// Constructs a reqwest-backed [`SessionClient`] from a caller-tuned `config`.
	#[cfg(feature = "reqwest")]
	pub fn build_reqwest_test_client_with(
		config: SessionConfig,
		path: &str,
	) -> (ReqwestSessionClient, TestPorts) {
		let transport = test_reqwest_transport(&config);

		build_test_client(config, transport, path)
	}
}

mod _prelude {
	pub use std::{
		collections::VecDeque,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tokio as _};
