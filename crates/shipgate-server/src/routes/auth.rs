//! Authentication routes: OAuth login flow, logout, current user.
//!
//! The login flow is the standard authorization-code dance with a CSRF
//! state cookie. All flow failures redirect back to the login page with a
//! machine-readable `error` query parameter rather than rendering an
//! error body — the browser is mid-redirect and has no client to parse
//! JSON.

use std::sync::Arc;

use axum::Extension;
use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use shipgate_core::session::{self, SESSION_TTL_SECS};
use shipgate_core::types::{ExternalProfile, Session};

use crate::cookies::{self, OAUTH_STATE_COOKIE, OAUTH_STATE_MAX_AGE_SECS, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the unauthenticated login-flow router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/login-start", get(login_start))
        .route("/login-callback", get(login_callback))
        .route("/logout", post(logout))
}

/// Build the session-gated user router.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new().route("/api/user", get(current_user))
}

// ── Types ────────────────────────────────────────────────────────────

/// Query parameters returned by the OAuth provider on callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentUserQuery {
    /// When `1`, re-read the user record and re-issue the session token
    /// so the cookie picks up server-side changes (billing upgrades).
    pub refresh: Option<String>,
}

/// Token endpoint response from the OAuth provider.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Profile response from the provider's user API.
#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: i64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

/// One entry from the provider's email listing API.
#[derive(Debug, Deserialize)]
struct ProviderEmail {
    email: String,
    primary: bool,
    verified: bool,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /login-start` — redirect to the provider's authorize endpoint.
///
/// A fresh random CSRF state is stored in a short-lived HTTP-only cookie
/// and echoed through the provider; the callback requires both copies to
/// match.
async fn login_start(State(state): State<Arc<AppState>>) -> Response {
    // Two UUID v4s = 32 bytes of OS CSPRNG randomness.
    let csrf_state = uuid::Uuid::new_v4().to_string().replace('-', "")
        + &uuid::Uuid::new_v4().to_string().replace('-', "");

    let redirect_uri = format!("{}/login-callback", state.app_url);
    let authorize_url = format!(
        "{}?client_id={}&redirect_uri={}&scope={}&state={}",
        state.oauth.authorize_url,
        urlencoding::encode(&state.oauth.client_id),
        urlencoding::encode(&redirect_uri),
        urlencoding::encode(&state.oauth.scope),
        urlencoding::encode(&csrf_state),
    );

    let state_cookie = cookies::build(
        OAUTH_STATE_COOKIE,
        &csrf_state,
        OAUTH_STATE_MAX_AGE_SECS,
        state.secure_cookies(),
    );

    (
        AppendHeaders([(SET_COOKIE, state_cookie)]),
        Redirect::temporary(&authorize_url),
    )
        .into_response()
}

/// `GET /login-callback` — complete the OAuth flow.
///
/// Failure modes redirect to `/login?error=...`:
/// - provider-reported errors echo the provider's error code
/// - `missing_params` when `code` or `state` is absent
/// - `invalid_state` when the CSRF check fails
/// - `callback_failed` for any downstream exchange or profile failure
async fn login_callback(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if let Some(err) = &query.error {
        warn!(error = %err, "OAuth provider returned error");
        return login_error_redirect(&state, err);
    }

    let (Some(code), Some(returned_state)) = (&query.code, &query.state) else {
        return login_error_redirect(&state, "missing_params");
    };

    // CSRF: the state echoed by the provider must match the cookie we
    // set at login-start. Constant-time comparison.
    let cookie_state = cookies::get(&headers, OAUTH_STATE_COOKIE);
    let state_ok = cookie_state.as_deref().is_some_and(|expected| {
        bool::from(expected.as_bytes().ct_eq(returned_state.as_bytes()))
    });
    if !state_ok {
        warn!("OAuth state mismatch or missing state cookie");
        return login_error_redirect(&state, "invalid_state");
    }

    match complete_login(&state, code).await {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "OAuth callback failed");
            login_error_redirect(&state, "callback_failed")
        }
    }
}

/// Code exchange, profile fetch, user upsert, session issuance.
async fn complete_login(state: &Arc<AppState>, code: &str) -> anyhow::Result<Response> {
    let redirect_uri = format!("{}/login-callback", state.app_url);
    let token: TokenResponse = state
        .http
        .post(&state.oauth.token_url)
        .header("Accept", "application/json")
        .form(&[
            ("client_id", state.oauth.client_id.as_str()),
            ("client_secret", state.oauth.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", &redirect_uri),
        ])
        .send()
        .await?
        .json()
        .await?;

    if let Some(err) = token.error {
        anyhow::bail!("token exchange rejected: {err}");
    }
    let access_token = token
        .access_token
        .ok_or_else(|| anyhow::anyhow!("token response carried no access_token"))?;

    let provider_user: ProviderUser = state
        .http
        .get(&state.oauth.user_api_url)
        .bearer_auth(&access_token)
        .header("User-Agent", "shipgate")
        .send()
        .await?
        .json()
        .await?;

    // The profile email can be null for users with a private email; the
    // dedicated emails API still returns the primary verified address.
    let email = match provider_user.email {
        Some(email) => Some(email),
        None => fetch_primary_email(state, &access_token).await,
    };

    let profile = ExternalProfile {
        github_id: provider_user.id,
        github_username: provider_user.login,
        name: provider_user.name,
        email,
        avatar_url: provider_user.avatar_url.unwrap_or_default(),
    };

    let user = state.directory.upsert_user(&profile).await?;
    state
        .audit
        .record(None, &user.id, "user.login", json!({}))
        .await;

    info!(user_id = %user.id, "login successful");

    let issued = session::issue(&state.session_key, &user, &access_token)?;
    let secure = state.secure_cookies();
    let session_cookie = cookies::build(SESSION_COOKIE, &issued.token, SESSION_TTL_SECS, secure);
    let clear_state = cookies::clear(OAUTH_STATE_COOKIE, secure);

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie), (SET_COOKIE, clear_state)]),
        Redirect::temporary(&format!("{}/dashboard", state.app_url)),
    )
        .into_response())
}

async fn fetch_primary_email(state: &Arc<AppState>, access_token: &str) -> Option<String> {
    let emails: Vec<ProviderEmail> = state
        .http
        .get(&state.oauth.emails_api_url)
        .bearer_auth(access_token)
        .header("User-Agent", "shipgate")
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()?;

    emails
        .into_iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email)
}

fn login_error_redirect(state: &Arc<AppState>, error: &str) -> Response {
    let url = format!("{}/login?error={}", state.app_url, urlencoding::encode(error));
    Redirect::temporary(&url).into_response()
}

/// `POST /logout` — delete the session cookie.
///
/// Stateless sessions cannot be revoked server-side; deleting the cookie
/// is the whole operation. Unauthenticated calls succeed too.
async fn logout(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Response {
    // Audit only when a valid session is present.
    if let Some(sess) = cookies::get(&headers, SESSION_COOKIE)
        .and_then(|t| session::verify(&state.session_key, &t))
    {
        state
            .audit
            .record(None, &sess.user.id, "user.logout", json!({}))
            .await;
    }

    let clear = cookies::clear(SESSION_COOKIE, state.secure_cookies());
    (
        AppendHeaders([(SET_COOKIE, clear)]),
        Json(json!({"ok": true})),
    )
        .into_response()
}

/// `GET /api/user` — the authenticated principal's profile.
///
/// With `?refresh=1` the user record is re-read and the session token
/// re-issued, so the cookie picks up subscription changes made since
/// login.
async fn current_user(
    State(state): State<Arc<AppState>>,
    Extension(sess): Extension<Session>,
    Query(query): Query<CurrentUserQuery>,
) -> Result<Response, ApiError> {
    if query.refresh.as_deref() != Some("1") {
        return Ok(Json(sess.user).into_response());
    }

    let user = state
        .directory
        .get_user(&sess.user.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("user no longer exists".to_owned()))?;

    let issued = session::reissue(&state.session_key, &sess, &user)?;
    let cookie = cookies::build(
        SESSION_COOKIE,
        &issued.token,
        SESSION_TTL_SECS,
        state.secure_cookies(),
    );

    Ok((AppendHeaders([(SET_COOKIE, cookie)]), Json(user)).into_response())
}
