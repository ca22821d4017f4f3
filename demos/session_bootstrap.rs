//! Demonstrates restoring a session at startup with the default reqwest transport.
//!
//! A stored session hint makes [`SessionClient::bootstrap`] call the refresh endpoint with the
//! refresh cookie from the shared jar. Ordinary requests wait for the bootstrap and then go
//! out with the restored bearer token.

// std
use std::sync::Arc;
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use url::Url;
// self
use token_relay::{
	config::SessionConfig,
	http::ReqwestTransport,
	nav::MemoryNavigator,
	reqwest::{Client, cookie::Jar},
	session::SessionClient,
	store::{HintStorage, MemoryStorage},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let api_base = Url::parse(&server.url("/api"))?;
	let exp = (OffsetDateTime::now_utc() + Duration::hours(1)).unix_timestamp();
	let claims = serde_json::json!({ "sub": 42, "email": "ada@example.com", "exp": exp });
	let token = format!(
		"{}.{}.demo-signature",
		URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#),
		URL_SAFE_NO_PAD.encode(claims.to_string()),
	);
	let refresh_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh").header("cookie", "refreshToken=demo");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "accessToken": token }));
		})
		.await;
	let orders_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", format!("Bearer {token}"));
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!([{ "id": 1, "total": "19.90" }]));
		})
		.await;
	let config = SessionConfig::builder(api_base.clone()).build()?;
	let jar = Arc::new(Jar::default());
	let client = Client::builder()
		.cookie_provider(jar.clone())
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()?;

	jar.add_cookie_str("refreshToken=demo; Path=/api; HttpOnly", &api_base);

	let storage = Arc::new(MemoryStorage::default());

	storage.set(&config.hint_key, "1")?;

	let session: SessionClient<ReqwestTransport> = SessionClient::with_transport(
		config,
		ReqwestTransport::with_client(client, jar, api_base),
		storage,
		Arc::new(MemoryNavigator::at("/orders")),
	);
	let established = session.bootstrap().await;
	let orders: serde_json::Value = session.get_json("/orders").await?;

	println!("Session restored: {established}; signed in as {:?}.", session.current_user());
	println!("Orders: {orders}.");

	refresh_mock.assert_async().await;
	orders_mock.assert_async().await;

	Ok(())
}
