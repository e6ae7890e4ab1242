//! Shared harness for server integration tests.
//!
//! Builds the full router against a fresh in-memory store and exposes a
//! directory handle over the same store so tests can seed records and
//! mint session cookies directly.

#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use shipgate_core::audit::AuditLog;
use shipgate_core::crypto::EnvelopeKey;
use shipgate_core::directory::Directory;
use shipgate_core::session::{self, SessionKey};
use shipgate_core::types::{ExternalProfile, User};
use shipgate_server::config::OAuthConfig;
use shipgate_server::state::AppState;

pub const APP_URL: &str = "http://localhost:8700";
pub const SESSION_SECRET: &str = "integration-session-secret";
pub const MASTER_KEY: &str = "integration-master-key";

pub struct TestApp {
    pub router: Router,
    /// Directory over the same store the server uses.
    pub directory: Directory,
    pub audit: AuditLog,
    pub session_key: SessionKey,
    /// Raw handle to the same store, for seeding shapes the directory
    /// never writes (e.g. already-expired invites).
    pub store: Arc<dyn shipgate_store::DocumentStore>,
}

pub fn test_app() -> TestApp {
    test_app_with_oauth(default_oauth())
}

pub fn default_oauth() -> OAuthConfig {
    OAuthConfig {
        client_id: "test-client".to_owned(),
        client_secret: "test-secret".to_owned(),
        authorize_url: "https://provider.test/authorize".to_owned(),
        token_url: "https://provider.test/token".to_owned(),
        user_api_url: "https://provider.test/user".to_owned(),
        emails_api_url: "https://provider.test/emails".to_owned(),
        scope: "read:user user:email".to_owned(),
    }
}

/// Build the app against a specific provider configuration, so tests can
/// point the OAuth endpoints at a local stub server.
pub fn test_app_with_oauth(oauth: OAuthConfig) -> TestApp {
    let store: Arc<dyn shipgate_store::DocumentStore> =
        Arc::new(shipgate_store::MemoryStore::new());

    let state = Arc::new(AppState {
        directory: Directory::new(Arc::clone(&store)),
        audit: AuditLog::new(Arc::clone(&store)),
        session_key: SessionKey::new(SESSION_SECRET),
        envelope_key: EnvelopeKey::derive(MASTER_KEY).unwrap(),
        oauth,
        app_url: APP_URL.to_owned(),
        http: reqwest::Client::new(),
    });

    TestApp {
        router: shipgate_server::build_router(state),
        directory: Directory::new(Arc::clone(&store)),
        audit: AuditLog::new(Arc::clone(&store)),
        session_key: SessionKey::new(SESSION_SECRET),
        store,
    }
}

impl TestApp {
    /// Seed a user and return it.
    pub async fn seed_user(&self, github_id: i64, username: &str) -> User {
        self.directory
            .upsert_user(&ExternalProfile {
                github_id,
                github_username: username.to_owned(),
                name: None,
                email: Some(format!("{username}@example.com")),
                avatar_url: String::new(),
            })
            .await
            .unwrap()
    }

    /// Mint a session cookie header value for the given user.
    pub fn session_cookie(&self, user: &User) -> String {
        let issued = session::issue(&self.session_key, user, "gh-token").unwrap();
        format!("shipgate_session={}", issued.token)
    }

    /// Drive one request through the router.
    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Build a JSON request.
pub fn json_request(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: &serde_json::Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// Build a bodyless request.
pub fn bare_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    builder.body(Body::empty()).unwrap()
}
