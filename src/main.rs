//! Main entry point for the zipresponse server.
//!
//! Serves a single directory as a ZIP archive that is generated while it
//! is being downloaded.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use zipresponse::{Cli, ZipResponse};

/// Application entry point.
///
/// Parses command-line arguments, binds the listener and serves until
/// Ctrl+C.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind to {}", cli.bind))?;

    if !cli.dir.is_dir() {
        tracing::warn!(
            dir = %cli.dir.display(),
            "directory does not exist yet; requests will receive an empty archive"
        );
    }
    tracing::info!(
        addr = %listener.local_addr()?,
        route = %cli.route,
        dir = %cli.dir.display(),
        "serving directory archive"
    );

    let app = Router::new()
        .route(&cli.route, get(archive))
        .with_state(Arc::new(cli));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server shut down");
    Ok(())
}

async fn archive(State(cli): State<Arc<Cli>>) -> ZipResponse {
    cli.zip_response()
}

/// Log level comes from `RUST_LOG`, defaulting to `info`.
fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C, shutting down"),
        Err(err) => tracing::error!(error = %err, "failed to install Ctrl+C handler"),
    }
}
