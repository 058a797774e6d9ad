#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use bearer_session::{_preludet::*, auth::TokenSecret, signal::SessionState};

#[tokio::test]
async fn login_then_logout_round_trips_the_signal() -> color_eyre::Result<()> {
	let server = MockServer::start_async().await;
	let (session, _) = build_reqwest_test_session(&server.base_url());
	let access = mint_token(
		"ada@example.com",
		Some("ROLE_USER"),
		(OffsetDateTime::now_utc() + Duration::minutes(15)).unix_timestamp(),
	);
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/login")
				.json_body(json!({ "email": "ada@example.com", "password": "hunter2" }));
			then.status(200).json_body(json!({ "token": access, "refreshToken": "refresh-1" }));
		})
		.await;
	let logout = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/auth/logout")
				.header("authorization", format!("Bearer {access}"));
			then.status(204);
		})
		.await;
	let mut states = session.subscribe();

	session.login("ada@example.com", "hunter2").await?;

	login.assert_async().await;

	let credential = session.store().get().expect("Login should store a credential.");

	assert_eq!(credential.access_token.expose(), access);
	assert_eq!(credential.refresh_token, Some(TokenSecret::new("refresh-1")));
	assert!(session.is_logged_in());
	assert_eq!(session.role().as_deref(), Some("ROLE_USER"));

	session.logout().await?;

	logout.assert_async().await;

	assert!(session.store().get().is_none());
	assert_eq!(
		states.drain(),
		vec![
			SessionState::Unauthenticated,
			SessionState::Authenticated,
			SessionState::Unauthenticated,
		],
	);

	Ok(())
}

#[tokio::test]
async fn logout_failure_never_blocks_local_teardown() {
	let server = MockServer::start_async().await;
	let (session, _) = build_reqwest_test_session(&server.base_url());
	let logout = server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/logout");
			then.status(500).body("boom");
		})
		.await;

	session
		.store()
		.set(
			&TokenSecret::new(token_expiring_in("ada", Duration::minutes(5))),
			Some(&TokenSecret::new("refresh-1")),
		)
		.expect("Seeding the store should succeed.");
	session.logout().await.expect("Local logout should succeed regardless of the server.");

	logout.assert_async().await;

	assert!(session.store().get().is_none());
	assert!(!session.is_logged_in());
}

#[tokio::test]
async fn rejected_login_is_reported() {
	let server = MockServer::start_async().await;
	let (session, _) = build_reqwest_test_session(&server.base_url());

	server
		.mock_async(|when, then| {
			when.method(POST).path("/auth/login");
			then.status(401).json_body(json!({ "message": "Bad credentials" }));
		})
		.await;

	let err = session.login("ada@example.com", "nope").await.expect_err("Login should fail.");

	assert!(matches!(err, Error::Rejected { endpoint: "login", status: 401 }));
	assert!(session.store().get().is_none());
}

#[tokio::test]
async fn check_email_reports_existing_accounts() {
	let server = MockServer::start_async().await;
	let (session, _) = build_reqwest_test_session(&server.base_url());
	let lookup = server
		.mock_async(|when, then| {
			when.method(GET).path("/auth/check-email").query_param("email", "ada@example.com");
			then.status(200).json_body(json!({ "exists": true }));
		})
		.await;

	assert!(session.check_email("ada@example.com").await.expect("Lookup should succeed."));

	lookup.assert_async().await;
}
