// ABOUTME: Entry point for the partshelf binary.
// ABOUTME: Loads config, initializes tracing with the live log layer, starts the sweeper and the HTTP server.

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use partshelf_core::{BroadcastLayer, LogBroadcaster};
use partshelf_server::{AppState, ServerConfig, create_router};
use partshelf_store::Sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env()?;
    let log = LogBroadcaster::default();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("failed to open log file {}", config.log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("partshelf=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .with(BroadcastLayer::new(log.clone()).with_filter(BroadcastLayer::default_filter()))
        .init();

    for dir in [config.library_root(), config.temp_root()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let bind = config.bind;
    let state = Arc::new(AppState::new(config, log));
    tracing::info!(
        "partshelf starting up: output {}, converter '{}'",
        state.config.output_base.display(),
        state.orchestrator.converter_name()
    );

    let cancel = CancellationToken::new();
    let sweeper = Sweeper::new(state.config.library_root(), state.retention_policy())
        .with_interval(state.config.sweep_interval)
        .spawn(cancel.clone());

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => tracing::info!("shutdown signal received"),
                _ = shutdown.cancelled() => {}
            }
            shutdown.cancel();
        })
        .await
        .context("server error")?;

    sweeper.shutdown().await;
    tracing::info!("partshelf stopped");
    Ok(())
}
