//! Shared application state for the Shipgate server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::sync::Arc;

use shipgate_core::audit::AuditLog;
use shipgate_core::crypto::EnvelopeKey;
use shipgate_core::directory::Directory;
use shipgate_core::session::SessionKey;

use crate::config::OAuthConfig;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Typed record access.
    pub directory: Directory,
    /// Append-only audit trail.
    pub audit: AuditLog,
    /// Session token signing key.
    pub session_key: SessionKey,
    /// Derived envelope encryption key for secret env values.
    pub envelope_key: EnvelopeKey,
    /// OAuth provider configuration.
    pub oauth: OAuthConfig,
    /// Public base URL, used for redirects and cookie security.
    pub app_url: String,
    /// Shared HTTP client for identity-provider calls.
    pub http: reqwest::Client,
}

impl AppState {
    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.app_url.starts_with("https://")
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

/// Convenience alias used by router constructors.
pub type SharedState = Arc<AppState>;
