//! Server configuration for Shipgate.
//!
//! Loads configuration from environment variables. Most settings have
//! sensible defaults; the two secrets (`SHIPGATE_SESSION_SECRET` and
//! `SHIPGATE_MASTER_KEY`) are required and startup fails fast without
//! them.

use std::net::SocketAddr;

/// A required environment variable was missing or invalid.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variable {name} is not set")]
    Missing { name: &'static str },
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Public base URL of the application (redirect target, cookie
    /// security). `Secure` cookies are set iff this is `https`.
    pub app_url: String,
    /// Log level filter (e.g. `info`, `debug`, `warn`).
    pub log_level: String,
    /// Secret for signing session tokens.
    pub session_secret: String,
    /// Master secret the envelope encryption key is derived from.
    pub master_key: String,
    /// OAuth provider endpoints and client credentials.
    pub oauth: OAuthConfig,
}

/// OAuth 2.0 provider configuration. Defaults target GitHub; every
/// endpoint can be overridden for tests or a compatible provider.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: String,
    pub token_url: String,
    pub user_api_url: String,
    pub emails_api_url: String,
    pub scope: String,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT` — port to bind on (binds to `0.0.0.0`)
    /// - `SHIPGATE_BIND_ADDR` — full bind address (overrides `PORT`, default: `127.0.0.1:8700`)
    /// - `SHIPGATE_APP_URL` — public base URL (default: `http://localhost:8700`)
    /// - `SHIPGATE_LOG_LEVEL` — log filter (default: `info`)
    /// - `SHIPGATE_SESSION_SECRET` — session signing secret (required)
    /// - `SHIPGATE_MASTER_KEY` — envelope key master secret (required)
    /// - `GITHUB_CLIENT_ID` / `GITHUB_CLIENT_SECRET` — OAuth client credentials
    /// - `SHIPGATE_OAUTH_AUTHORIZE_URL`, `SHIPGATE_OAUTH_TOKEN_URL`,
    ///   `SHIPGATE_OAUTH_USER_API_URL`, `SHIPGATE_OAUTH_EMAILS_API_URL` —
    ///   provider endpoint overrides (default: GitHub)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a required secret is absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Priority: SHIPGATE_BIND_ADDR > PORT > default 127.0.0.1:8700
        let bind_addr = if let Ok(addr) = std::env::var("SHIPGATE_BIND_ADDR") {
            addr.parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8700)))
        } else if let Ok(port_str) = std::env::var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(8700);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            SocketAddr::from(([127, 0, 0, 1], 8700))
        };

        let app_url = std::env::var("SHIPGATE_APP_URL")
            .unwrap_or_else(|_| "http://localhost:8700".to_owned());

        let log_level =
            std::env::var("SHIPGATE_LOG_LEVEL").unwrap_or_else(|_| "info".to_owned());

        let session_secret = require("SHIPGATE_SESSION_SECRET")?;
        let master_key = require("SHIPGATE_MASTER_KEY")?;

        let oauth = OAuthConfig {
            client_id: std::env::var("GITHUB_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("GITHUB_CLIENT_SECRET").unwrap_or_default(),
            authorize_url: std::env::var("SHIPGATE_OAUTH_AUTHORIZE_URL")
                .unwrap_or_else(|_| "https://github.com/login/oauth/authorize".to_owned()),
            token_url: std::env::var("SHIPGATE_OAUTH_TOKEN_URL")
                .unwrap_or_else(|_| "https://github.com/login/oauth/access_token".to_owned()),
            user_api_url: std::env::var("SHIPGATE_OAUTH_USER_API_URL")
                .unwrap_or_else(|_| "https://api.github.com/user".to_owned()),
            emails_api_url: std::env::var("SHIPGATE_OAUTH_EMAILS_API_URL")
                .unwrap_or_else(|_| "https://api.github.com/user/emails".to_owned()),
            scope: "read:user user:email".to_owned(),
        };

        Ok(Self {
            bind_addr,
            app_url,
            log_level,
            session_secret,
            master_key,
            oauth,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::Missing { name }),
    }
}
