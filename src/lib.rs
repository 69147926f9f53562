pub mod advisory;
pub mod coerce;
pub mod config;
pub mod db;
pub mod errors;
pub mod http;
pub mod metrics;
pub mod models;
pub mod options;
pub mod redaction;
pub mod risk;
pub mod scoring;
pub mod tracker;

use crate::config::AppConfig;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::http::{build_router, AppState};
use crate::tracker::TrackerCore;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// Opens the store, wires the generator and serves the API until ctrl-c.
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    init_tracing(&config.log_dir).context("failed to initialise logging")?;

    let db = Database::new(&config.database_path)
        .with_context(|| format!("failed to open database at {}", config.database_path.display()))?;
    let generator = advisory::load_generator(&config.generator);
    let tracker = Arc::new(TrackerCore::new(db, generator));
    let router = build_router(AppState::new(tracker, config.default_actor.clone()));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address))?;
    tracing::info!(address = %config.bind_address, "initiative tracker listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("initiative tracker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %error, "failed to listen for shutdown signal");
    }
}

/// JSON lines to a daily rolling file plus a human-readable stderr mirror.
pub fn init_tracing(log_dir: &Path) -> AppResult<()> {
    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "tracker.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}
