//! Shipgate server entry point.
//!
//! Bootstraps the document store, derives the envelope key, builds the
//! shared state, then starts the Axum HTTP server with graceful shutdown.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use shipgate_core::audit::AuditLog;
use shipgate_core::crypto::EnvelopeKey;
use shipgate_core::directory::Directory;
use shipgate_core::session::SessionKey;
use shipgate_store::{DocumentStore, MemoryStore};

use shipgate_server::build_router;
use shipgate_server::config::ServerConfig;
use shipgate_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!("Shipgate starting");

    let state = build_app_state(&config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "Shipgate server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shipgate server stopped");
    Ok(())
}

/// Build the shared application state.
///
/// Key derivation is the slow step here (Argon2id over the master
/// secret); it runs exactly once at startup.
fn build_app_state(config: &ServerConfig) -> anyhow::Result<Arc<AppState>> {
    info!("using in-memory storage (data will not persist)");
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());

    let envelope_key =
        EnvelopeKey::derive(&config.master_key).context("failed to derive envelope key")?;

    let http = reqwest::Client::builder()
        .user_agent("shipgate")
        .build()
        .context("failed to build HTTP client")?;

    Ok(Arc::new(AppState {
        directory: Directory::new(Arc::clone(&store)),
        audit: AuditLog::new(store),
        session_key: SessionKey::new(&config.session_secret),
        envelope_key,
        oauth: config.oauth.clone(),
        app_url: config.app_url.clone(),
        http,
    }))
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
