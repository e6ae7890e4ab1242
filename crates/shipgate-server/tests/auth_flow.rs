//! Login flow and session gate integration tests.

#![allow(clippy::unwrap_used)]

mod common;

use axum::http::StatusCode;
use axum::http::header::{LOCATION, SET_COOKIE};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;

use common::{APP_URL, bare_request, body_json, default_oauth, test_app, test_app_with_oauth};

#[tokio::test]
async fn login_start_sets_state_cookie_and_redirects() {
    let app = test_app();
    let response = app.request(bare_request("GET", "/login-start", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response.headers()[LOCATION].to_str().unwrap();
    assert!(location.starts_with("https://provider.test/authorize?"));
    assert!(location.contains("client_id=test-client"));
    assert!(location.contains("state="));

    let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("shipgate_oauth_state="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Max-Age=600"));
    // App URL is http, so no Secure attribute.
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn callback_without_params_redirects_with_missing_params() {
    let app = test_app();
    let response = app.request(bare_request("GET", "/login-callback", None)).await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[LOCATION].to_str().unwrap(),
        format!("{APP_URL}/login?error=missing_params")
    );
}

#[tokio::test]
async fn callback_without_state_cookie_is_invalid_state() {
    let app = test_app();
    let response = app
        .request(bare_request(
            "GET",
            "/login-callback?code=abc&state=xyz",
            None,
        ))
        .await;

    assert_eq!(
        response.headers()[LOCATION].to_str().unwrap(),
        format!("{APP_URL}/login?error=invalid_state")
    );
}

#[tokio::test]
async fn callback_with_mismatched_state_is_invalid_state() {
    let app = test_app();
    let response = app
        .request(bare_request(
            "GET",
            "/login-callback?code=abc&state=attacker-chosen",
            Some("shipgate_oauth_state=the-real-state"),
        ))
        .await;

    assert_eq!(
        response.headers()[LOCATION].to_str().unwrap(),
        format!("{APP_URL}/login?error=invalid_state")
    );
}

#[tokio::test]
async fn callback_echoes_provider_error() {
    let app = test_app();
    let response = app
        .request(bare_request(
            "GET",
            "/login-callback?error=access_denied",
            None,
        ))
        .await;

    assert_eq!(
        response.headers()[LOCATION].to_str().unwrap(),
        format!("{APP_URL}/login?error=access_denied")
    );
}

/// Stand up a stub OAuth provider on an ephemeral port and return its
/// base URL. Responds like GitHub: token exchange, a profile with a
/// private (null) email, and the emails API carrying the primary address.
async fn stub_provider() -> String {
    let app = Router::new()
        .route(
            "/token",
            post(|| async { Json(json!({"access_token": "stub-access-token"})) }),
        )
        .route(
            "/user",
            get(|| async {
                Json(json!({
                    "id": 4242,
                    "login": "octocat",
                    "name": "Octo Cat",
                    "email": null,
                    "avatar_url": "https://avatars.test/octocat.png",
                }))
            }),
        )
        .route(
            "/emails",
            get(|| async {
                Json(json!([
                    {"email": "spare@example.com", "primary": false, "verified": true},
                    {"email": "octo@example.com", "primary": true, "verified": true},
                ]))
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn callback_happy_path_issues_session_and_clears_state() {
    let provider = stub_provider().await;
    let mut oauth = default_oauth();
    oauth.token_url = format!("{provider}/token");
    oauth.user_api_url = format!("{provider}/user");
    oauth.emails_api_url = format!("{provider}/emails");
    let app = test_app_with_oauth(oauth);

    let response = app
        .request(bare_request(
            "GET",
            "/login-callback?code=auth-code&state=the-state",
            Some("shipgate_oauth_state=the-state"),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers()[LOCATION].to_str().unwrap(),
        format!("{APP_URL}/dashboard")
    );

    let cookies: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies.len(), 2);

    // A real session cookie with the full validity window.
    let session_cookie = cookies
        .iter()
        .find(|c| c.starts_with("shipgate_session="))
        .unwrap();
    assert!(session_cookie.contains("HttpOnly"));
    assert!(session_cookie.contains("Max-Age=604800"));

    // The CSRF cookie is deleted.
    let state_cookie = cookies
        .iter()
        .find(|c| c.starts_with("shipgate_oauth_state="))
        .unwrap();
    assert!(state_cookie.starts_with("shipgate_oauth_state=;"));
    assert!(state_cookie.contains("Max-Age=0"));

    // The issued token verifies and carries the fetched profile,
    // including the primary email resolved via the emails API.
    let token = session_cookie
        .strip_prefix("shipgate_session=")
        .unwrap()
        .split(';')
        .next()
        .unwrap();
    let session = shipgate_core::session::verify(&app.session_key, token).unwrap();
    assert_eq!(session.user.github_id, 4242);
    assert_eq!(session.user.github_username, "octocat");
    assert_eq!(session.user.email.as_deref(), Some("octo@example.com"));
    assert_eq!(session.access_token, "stub-access-token");

    // The user was created and the login audited at account scope.
    assert!(app
        .directory
        .get_user(&session.user.id)
        .await
        .unwrap()
        .is_some());
    let entries = app.audit.list("account", None).await.unwrap();
    assert!(entries.iter().any(|e| {
        e.action == "user.login" && e.actor_user_id == session.user.id
    }));
}

#[tokio::test]
async fn api_without_session_is_unauthorized() {
    let app = test_app();
    let response = app.request(bare_request("GET", "/api/user", None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn api_with_garbage_session_is_unauthorized() {
    let app = test_app();
    let response = app
        .request(bare_request(
            "GET",
            "/api/user",
            Some("shipgate_session=not.a-real-token"),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn api_with_valid_session_returns_user() {
    let app = test_app();
    let user = app.seed_user(42, "octocat").await;
    let cookie = app.session_cookie(&user);

    let response = app.request(bare_request("GET", "/api/user", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["id"], user.id);
    assert_eq!(body["github_username"], "octocat");
}

#[tokio::test]
async fn user_refresh_reissues_cookie_with_current_record() {
    let app = test_app();
    let user = app.seed_user(42, "octocat").await;
    let cookie = app.session_cookie(&user);

    // Upgrade the stored subscription behind the session's back.
    let upgraded = shipgate_core::types::Subscription {
        tier: shipgate_core::types::SubscriptionTier::Pro,
        expires_at: None,
    };
    app.directory
        .update_user_subscription(&user.id, upgraded)
        .await
        .unwrap();

    // Without refresh the stale snapshot is served.
    let stale = app.request(bare_request("GET", "/api/user", Some(&cookie))).await;
    assert_eq!(body_json(stale).await["subscription"]["tier"], "free");

    // With refresh the record is re-read and a new cookie issued.
    let response = app
        .request(bare_request("GET", "/api/user?refresh=1", Some(&cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let new_cookie = response.headers()[SET_COOKIE].to_str().unwrap().to_owned();
    assert!(new_cookie.starts_with("shipgate_session="));
    assert_eq!(body_json(response).await["subscription"]["tier"], "pro");
}

#[tokio::test]
async fn logout_clears_session_cookie() {
    let app = test_app();
    let user = app.seed_user(42, "octocat").await;
    let cookie = app.session_cookie(&user);

    let response = app.request(bare_request("POST", "/logout", Some(&cookie))).await;

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    assert!(set_cookie.starts_with("shipgate_session=;"));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn logout_without_session_still_succeeds() {
    let app = test_app();
    let response = app.request(bare_request("POST", "/logout", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn security_headers_are_present() {
    let app = test_app();
    let response = app.request(bare_request("GET", "/healthz", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["cache-control"], "no-store");
}
