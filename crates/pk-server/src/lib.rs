//! pk-server: HTTP API server for the periploko video catalog.
//!
//! This crate ties the other pk-* crates into a running server. It provides:
//!
//! - Filesystem scanning, sidecar lookup and concurrent catalog assembly
//! - Optional metadata enrichment (TMDB) behind a provider trait
//! - Range streaming, live transcoding and SRT to WebVTT conversion
//! - Graceful shutdown via signal handling

pub mod catalog;
pub mod context;
pub mod enrichment;
pub mod error;
pub mod middleware;
pub mod resolve;
pub mod router;
pub mod routes;
pub mod scanner;
pub mod sessions;
pub mod sidecar;
pub mod subtitle;

use std::net::SocketAddr;

use pk_core::config::Config;

pub use crate::context::AppContext;

/// Start the periploko server.
///
/// Builds the [`AppContext`] from `config`, binds the listener and serves
/// until SIGINT or SIGTERM. In-flight responses are allowed to finish.
pub async fn start(config: Config) -> pk_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| pk_core::Error::Internal(format!("Invalid server address: {e}")))?;
    let static_dir = config.server.static_dir.clone();

    for (i, root) in config.library.roots.iter().enumerate() {
        tracing::info!(index = i, root = %root.display(), "Media root");
    }

    let ctx = AppContext::from_config(config)?;
    let app = router::build_router(ctx, static_dir);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| pk_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("Starting server on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
