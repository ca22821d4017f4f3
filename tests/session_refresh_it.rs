#![cfg(all(feature = "reqwest", feature = "test"))]

// std
use std::time::Duration as StdDuration;
// crates.io
use futures::future;
use httpmock::prelude::*;
use reqwest::cookie::CookieStore;
// self
use token_relay::{
	_preludet::*,
	auth::AccessToken,
	config::SessionConfig,
	error::{RefreshError, TransportError},
	store::HintStorage,
};

const HINT_KEY: &str = "auth_session_hint";

fn expired_jwt(sub: &str) -> String {
	test_jwt(sub, (OffsetDateTime::now_utc() - Duration::minutes(10)).unix_timestamp())
}

fn api_url(server: &MockServer) -> Url {
	Url::parse(&server.url("/api")).expect("Mock API base should parse.")
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
	let server = MockServer::start_async().await;
	let (client, ports) = build_reqwest_test_client(&server.url("/api"), "/orders");
	let stale = expired_jwt("user-1");
	let fresh = AccessToken::new("new.jwt.token");

	client.transport.cookie_jar().add_cookie_str("refreshToken=r1; Path=/api", &api_url(&server));
	client.establish_session(AccessToken::new(stale.clone()));

	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", format!("Bearer {stale}"));
			then.status(401).body("token expired");
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/orders")
				.header("authorization", format!("Bearer {}", fresh.expose()));
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "orders": [] }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh").header("cookie", "refreshToken=r1");
			then.status(200)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "accessToken": fresh.expose() }))
				.delay(StdDuration::from_millis(300));
		})
		.await;
	let results = future::join_all((0..5).map(|_| client.get("/orders"))).await;

	for result in results {
		let response = result.expect("Every queued request should be replayed successfully.");

		assert_eq!(response.status.as_u16(), 200);
	}

	refresh.assert_calls_async(1).await;
	rejected.assert_calls_async(5).await;
	accepted.assert_calls_async(5).await;

	assert_eq!(client.access_token(), Some(fresh));
	assert_eq!(ports.storage.peek(HINT_KEY).as_deref(), Some("1"));
	assert_eq!(client.refresh_metrics.attempts(), 1);
	assert_eq!(client.refresh_metrics.successes(), 1);
	assert_eq!(client.refresh_metrics.queued(), 4);
	assert!(!client.is_refreshing());
	assert!(ports.navigator.history().is_empty());
}

#[tokio::test]
async fn refresh_failure_clears_session_and_redirects_to_login() {
	let server = MockServer::start_async().await;
	let (client, ports) = build_reqwest_test_client(&server.url("/api"), "/checkout");
	let stale = expired_jwt("user-2");
	let cookie_url = api_url(&server);

	client.transport.cookie_jar().add_cookie_str("refreshToken=r2; Path=/api", &cookie_url);
	client.establish_session(AccessToken::new(stale));

	let cart = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/cart");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(401).body("refresh token revoked");
		})
		.await;
	let err = client.get("/cart").await.expect_err("A rejected refresh should fail the request.");

	assert!(matches!(err, Error::Refresh(RefreshError::Rejected { status: 401 })));

	cart.assert_async().await;
	refresh.assert_async().await;

	assert_eq!(client.access_token(), None);
	assert_eq!(ports.storage.peek(HINT_KEY), None);
	assert_eq!(ports.navigator.history(), vec!["/login?callbackUrl=%2Fcheckout".to_owned()]);
	assert_eq!(client.refresh_metrics.failures(), 1);

	let cookies = client.transport.cookie_jar().cookies(&cookie_url);

	assert!(
		cookies.is_none_or(|value| !value.to_str().is_ok_and(|s| s.contains("refreshToken"))),
		"Refresh cookie should be expired after a failed refresh."
	);
}

#[tokio::test]
async fn anonymous_unauthorized_response_skips_refresh() {
	let server = MockServer::start_async().await;
	let (client, ports) = build_reqwest_test_client(&server.url("/api"), "/orders");
	let orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(serde_json::json!({ "accessToken": "unused" }));
		})
		.await;
	let err = client.get("/orders").await.expect_err("Anonymous 401 should reach the caller.");

	assert!(err.is_unauthorized());

	orders.assert_async().await;
	refresh.assert_calls_async(0).await;

	assert_eq!(ports.navigator.last_navigation().as_deref(), Some("/login?callbackUrl=%2Forders"));
	assert_eq!(client.refresh_metrics.attempts(), 0);
}

#[tokio::test]
async fn anonymous_unauthorized_response_on_unprotected_page_stays_put() {
	let server = MockServer::start_async().await;
	let (client, ports) = build_reqwest_test_client(&server.url("/api"), "/products?page=2");
	let wishlist = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/wishlist");
			then.status(401);
		})
		.await;
	let err = client.get("/wishlist").await.expect_err("Anonymous 401 should reach the caller.");

	assert_eq!(err.status(), Some(401));

	wishlist.assert_async().await;

	assert!(ports.navigator.history().is_empty());
}

#[tokio::test]
async fn exempt_endpoint_failure_is_returned_untouched() {
	let server = MockServer::start_async().await;
	let (client, ports) = build_reqwest_test_client(&server.url("/api"), "/login");

	client.establish_session(fresh_test_jwt("user-3"));

	let login = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/login");
			then.status(401)
				.header("content-type", "application/json")
				.json_body(serde_json::json!({ "message": "Invalid credentials" }));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(serde_json::json!({ "accessToken": "unused" }));
		})
		.await;
	let err = client
		.post_json::<_, serde_json::Value>(
			"/auth/login",
			&serde_json::json!({ "email": "a@shop.test", "password": "wrong" }),
		)
		.await
		.expect_err("Bad credentials should fail.");

	match err {
		Error::Status(status) => {
			assert_eq!(status.status, 401);
			assert!(status.body_preview.contains("Invalid credentials"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}

	login.assert_async().await;
	refresh.assert_calls_async(0).await;

	assert!(ports.navigator.history().is_empty());
	assert_eq!(ports.storage.peek(HINT_KEY).as_deref(), Some("1"));
}

#[tokio::test]
async fn non_unauthorized_errors_propagate_without_refresh() {
	let server = MockServer::start_async().await;
	let (client, _ports) = build_reqwest_test_client(&server.url("/api"), "/orders");

	client.establish_session(fresh_test_jwt("user-4"));

	let orders = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders");
			then.status(503).body("maintenance");
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200);
		})
		.await;
	let err = client.get("/orders").await.expect_err("503 should surface as a status error.");

	assert_eq!(err.status(), Some(503));

	orders.assert_async().await;
	refresh.assert_calls_async(0).await;

	assert!(client.access_token().is_some());
}

#[tokio::test]
async fn replayed_request_is_attempted_only_once() {
	let server = MockServer::start_async().await;
	let (client, _ports) = build_reqwest_test_client(&server.url("/api"), "/profile");

	client.establish_session(AccessToken::new(expired_jwt("user-5")));

	let profile = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/users/me");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(serde_json::json!({ "token": "rotated.jwt.token" }));
		})
		.await;
	let err = client.get("/users/me").await.expect_err("Replay 401 should reach the caller.");

	assert!(err.is_unauthorized());

	profile.assert_calls_async(2).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(client.access_token().as_ref().map(AccessToken::expose), Some("rotated.jwt.token"));
}

#[tokio::test]
async fn bootstrap_restores_session_before_first_request() {
	let server = MockServer::start_async().await;
	let (client, ports) = build_reqwest_test_client(&server.url("/api"), "/orders");
	let fresh = fresh_test_jwt("user-6");

	ports.storage.set(HINT_KEY, "1").expect("Memory storage should accept the hint.");

	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.json_body(serde_json::json!({ "accessToken": fresh.expose() }))
				.delay(StdDuration::from_millis(100));
		})
		.await;
	let orders = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/api/orders")
				.header("authorization", format!("Bearer {}", fresh.expose()));
			then.status(200).json_body(serde_json::json!([{ "id": 7 }]));
		})
		.await;
	let gate = client.bootstrap();

	assert!(client.is_bootstrapping());

	let (established, listed) = tokio::join!(gate, client.get_json::<serde_json::Value>("/orders"));

	assert!(established);
	assert_eq!(listed.expect("Request should wait for the restored session."), serde_json::json!([
		{ "id": 7 }
	]));

	refresh.assert_async().await;
	orders.assert_async().await;

	assert!(!client.is_bootstrapping());
	assert_eq!(client.current_user().map(|user| user.sub), Some("user-6".to_owned()));
}

#[tokio::test]
async fn bootstrap_without_hint_never_calls_refresh() {
	let server = MockServer::start_async().await;
	let (client, _ports) = build_reqwest_test_client(&server.url("/api"), "/");
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200);
		})
		.await;

	assert!(!client.bootstrap().await);

	refresh.assert_calls_async(0).await;
}

#[tokio::test]
async fn timed_out_refresh_ends_the_session() {
	let server = MockServer::start_async().await;
	let config = SessionConfig::builder(api_url(&server))
		.refresh_timeout(StdDuration::from_millis(200))
		.build()
		.expect("Short refresh timeout should validate.");
	let (client, ports) = build_reqwest_test_client_with(config, "/checkout");

	client.establish_session(AccessToken::new(expired_jwt("user-11")));

	let cart = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/cart");
			then.status(401);
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200)
				.json_body(serde_json::json!({ "accessToken": "too.late.token" }))
				.delay(StdDuration::from_secs(2));
		})
		.await;
	let err = client.get("/cart").await.expect_err("A stalled refresh should fail the request.");

	assert!(
		matches!(err, Error::Refresh(RefreshError::Transport(TransportError::Timeout { .. }))),
		"Unexpected error: {err:?}."
	);

	cart.assert_async().await;
	refresh.assert_calls_async(1).await;

	assert_eq!(client.access_token(), None);
	assert_eq!(ports.storage.peek(HINT_KEY), None);
	assert_eq!(ports.navigator.history(), vec!["/login?callbackUrl=%2Fcheckout".to_owned()]);
	assert_eq!(client.refresh_metrics.failures(), 1);
}

#[tokio::test]
async fn late_unauthorized_response_replays_with_rotated_token() {
	let server = MockServer::start_async().await;
	let (client, _ports) = build_reqwest_test_client(&server.url("/api"), "/orders");
	let old = AccessToken::new("old.jwt.token");
	let rotated = AccessToken::new("rotated.jwt.token");

	client.establish_session(old.clone());

	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", old.bearer());
			then.status(401).delay(StdDuration::from_millis(400));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path("/api/orders").header("authorization", rotated.bearer());
			then.status(200).json_body(serde_json::json!([]));
		})
		.await;
	let refresh = server
		.mock_async(|when, then| {
			when.method(POST).path("/api/auth/refresh");
			then.status(200).json_body(serde_json::json!({ "accessToken": rotated.expose() }));
		})
		.await;
	let (listed, refreshed) = tokio::join!(client.get("/orders"), async {
		tokio::time::sleep(StdDuration::from_millis(100)).await;

		client.refresh_session().await
	});

	assert_eq!(refreshed.expect("Explicit refresh should succeed."), rotated);

	listed.expect("Late 401 should replay with the rotated token.");
	rejected.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
	refresh.assert_calls_async(1).await;

	assert_eq!(client.refresh_metrics.attempts(), 1);
}
