//! Shipgate HTTP server.
//!
//! Wires the trust core to Axum: OAuth login, cookie sessions, project
//! access control, secret env management, team invites, and the audit
//! API. The router builder lives here so integration tests can drive the
//! full middleware stack without binding a socket.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::middleware as axum_mw;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod cookies;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use crate::middleware::session_middleware;
use crate::state::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Everything under /api requires a valid session.
    let authenticated = Router::new()
        .merge(routes::auth::api_router())
        .merge(routes::projects::router())
        .merge(routes::teams::router())
        .route_layer(axum_mw::from_fn_with_state(
            Arc::clone(&state),
            session_middleware,
        ));

    // Concurrency-limit the login flow (callbacks fan out to the
    // identity provider) to prevent resource exhaustion.
    let login_routes = routes::auth::router()
        .layer(tower::limit::ConcurrencyLimitLayer::new(32));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .merge(login_routes)
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            axum::http::header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}
