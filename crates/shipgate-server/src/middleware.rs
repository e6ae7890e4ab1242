//! Session middleware.
//!
//! Extracts the session cookie, verifies the signed token, and injects
//! the decoded [`Session`] into request extensions for downstream
//! handlers. Requests without a valid session get a 401 JSON response.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use shipgate_core::session;

use crate::cookies::{self, SESSION_COOKIE};
use crate::state::AppState;

/// Middleware that validates the session cookie.
///
/// Verification is fail-closed: a missing, malformed, tampered, or
/// expired token all produce the same 401.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = cookies::get(req.headers(), SESSION_COOKIE);

    let verified = token
        .as_deref()
        .and_then(|t| session::verify(&state.session_key, t));

    match verified {
        Some(sess) => {
            req.extensions_mut().insert(sess);
            next.run(req).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "error": "unauthorized",
                "message": "missing or invalid session"
            })),
        )
            .into_response(),
    }
}
