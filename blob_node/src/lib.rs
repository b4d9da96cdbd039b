//! Connection handling, protocol dispatch, and server wiring.

pub mod config;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;

use std::sync::Arc;

use blob_auth::TokenVerifier;
use blob_registry::DEFAULT_SHUTDOWN_TIMEOUT;
use blob_store::LocalStore;
use tokio::net::TcpListener;
use tokio::sync::watch;

pub use config::ServiceConfig;
pub use state::AppState;

/// Binds the listener, wires up shared state, and runs until `SIGINT` or
/// `SIGTERM`, then drains in-flight handlers before returning.
pub async fn run_server(config: ServiceConfig) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.storage_root).await?;

    let store = Arc::new(LocalStore::new(config.storage_root.clone()));
    let verifier = Arc::new(TokenVerifier::new(config.token_secret.as_bytes()));
    let state = Arc::new(AppState::new(store, verifier));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let accept_task = tokio::spawn(transport::accept_loop(
        listener,
        state.clone(),
        shutdown_rx,
    ));

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining connections");

    let _ = shutdown_tx.send(true);
    let _ = accept_task.await;

    state.gate.shutdown(DEFAULT_SHUTDOWN_TIMEOUT).await;
    tracing::info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
