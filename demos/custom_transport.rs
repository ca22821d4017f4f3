//! Demonstrates plugging a custom [`SessionTransport`] into a [`SessionClient`].
//!
//! 1. Implement [`SessionTransport::execute`] so it returns buffered [`ApiResponse`] values.
//! 2. Optionally override [`SessionTransport::expire_cookie`] to drop the refresh cookie.
//! 3. Pass the transport, a hint storage port, and a navigator to
//!    [`SessionClient::with_transport`].
//! 4. Watch a stale token get refreshed and the request replayed, then watch a dead refresh
//!    cookie end the session.

// std
use std::sync::{
	Arc,
	atomic::{AtomicBool, AtomicUsize, Ordering},
};
// crates.io
use color_eyre::Result;
use http::StatusCode;
use parking_lot::Mutex;
use url::Url;
// self
use token_relay::{
	auth::AccessToken,
	config::SessionConfig,
	http::{ApiRequest, ApiResponse, SessionTransport, TransportFuture},
	nav::MemoryNavigator,
	session::SessionClient,
	store::{HintStorage, MemoryStorage},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let api_base = Url::parse("https://storefront.example.com/api")?;
	let config = SessionConfig::builder(api_base).build()?;
	let storage = Arc::new(MemoryStorage::default());
	let navigator = Arc::new(MemoryNavigator::at("/orders?page=2"));
	let hint_storage: Arc<dyn HintStorage> = storage.clone();
	let client: SessionClient<StorefrontStub> = SessionClient::with_transport(
		config,
		StorefrontStub::default(),
		hint_storage,
		navigator.clone(),
	);

	client.establish_session(AccessToken::new("expired-token"));

	let orders = client.get("/orders").await?;

	println!(
		"Orders answered {} after {} refresh call(s); session hint is {:?}.",
		orders.status,
		client.transport.refreshes.load(Ordering::Relaxed),
		storage.peek("auth_session_hint"),
	);

	client.transport.cookie_alive.store(false, Ordering::Relaxed);
	client.establish_session(AccessToken::new("revoked-token"));

	match client.get("/orders").await {
		Ok(_) => println!("Stub transport unexpectedly accepted a revoked session."),
		Err(e) => println!("Refresh failed and the session ended: {e}."),
	}

	println!(
		"Navigations: {:?}; expired cookies: {:?}.",
		navigator.history(),
		client.transport.expired.lock(),
	);

	Ok(())
}

/// Transport answering from memory: accepts the last token it issued and rotates tokens for
/// as long as the refresh cookie is alive.
#[derive(Debug)]
struct StorefrontStub {
	cookie_alive: AtomicBool,
	refreshes: AtomicUsize,
	issued: Mutex<Option<String>>,
	expired: Mutex<Vec<String>>,
}
impl Default for StorefrontStub {
	fn default() -> Self {
		Self {
			cookie_alive: AtomicBool::new(true),
			refreshes: AtomicUsize::new(0),
			issued: Mutex::new(None),
			expired: Mutex::new(Vec::new()),
		}
	}
}
impl SessionTransport for StorefrontStub {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let url = request.url.clone();

			if url.path().ends_with("/auth/refresh") {
				if !self.cookie_alive.load(Ordering::Relaxed) {
					return Ok(ApiResponse::new(url, StatusCode::UNAUTHORIZED, "cookie revoked"));
				}

				let n = self.refreshes.fetch_add(1, Ordering::Relaxed) + 1;
				let token = format!("rotated-token-{n}");
				let body = serde_json::json!({ "accessToken": token }).to_string();

				*self.issued.lock() = Some(token);

				return Ok(ApiResponse::new(url, StatusCode::OK, body));
			}

			let accepted = {
				let issued = self.issued.lock();

				issued.is_some() && request.bearer_token() == issued.as_deref()
			};
			let status = if accepted { StatusCode::OK } else { StatusCode::UNAUTHORIZED };

			Ok(ApiResponse::new(url, status, "[]"))
		})
	}

	fn expire_cookie(&self, name: &str, path: &str) {
		self.expired.lock().push(format!("{name}@{path}"));
	}
}
