//! locus - the location-event drain-and-ship service.
//!
//! Wires the capability interfaces from `locus-queue`/`locus-blob`/
//! `locus-warehouse`/`locus-backup` into a `locus_pipeline::CycleCoordinator`,
//! drives it from a fixed-cadence scheduler tick, and exposes a thin `axum`
//! HTTP surface (`/healthz`, `/metrics`, `/trigger`) alongside it. Modeled on
//! `otlp2parquet-server`'s split between `init` (wiring) and `lib` (serving).

pub mod http;
pub mod init;
pub mod scheduler;

use anyhow::{Context, Result};
use locus_config::RuntimeConfig;
use locus_pipeline::CycleCoordinator;
use metrics_exporter_prometheus::PrometheusBuilder;
use scheduler::ShutdownHandle;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Builds every concrete client from `config` and runs the scheduler loop
/// and HTTP surface concurrently until a shutdown signal arrives.
///
/// Shutdown has two phases: the HTTP server stops accepting new requests and
/// drains in-flight ones (axum's own graceful shutdown), then the scheduler
/// is told to stop starting new cycles and is given up to
/// `scheduler.shutdown_grace_period()` to let a cycle already in flight
/// finish before the process exits.
pub async fn run(config: RuntimeConfig) -> Result<()> {
    let coordinator = Arc::new(
        init::build_coordinator(&config)
            .await
            .context("failed to build cycle coordinator")?,
    );

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus metrics recorder")?;

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;
    let app = http::router(coordinator.clone(), metrics_handle);

    info!(addr = %config.server.listen_addr, "locus HTTP surface listening");

    let shutdown = ShutdownHandle::new();
    let scheduler_handle = tokio::spawn(scheduler::run(
        coordinator,
        config.scheduler.tick_interval(),
        shutdown.clone(),
    ));

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    server.await.context("HTTP server error")?;

    shutdown.shutdown();
    let grace_period = config.scheduler.shutdown_grace_period();
    match tokio::time::timeout(grace_period, scheduler_handle).await {
        Ok(Ok(())) => info!("scheduler stopped cleanly"),
        Ok(Err(e)) => warn!(error = %e, "scheduler task panicked during shutdown"),
        Err(_) => warn!(
            grace_period_seconds = grace_period.as_secs(),
            "scheduler did not stop within the shutdown grace period, exiting anyway"
        ),
    }

    info!("locus shutdown complete");
    Ok(())
}

/// Graceful shutdown on Ctrl+C or SIGTERM (mirrors `otlp2parquet-server`).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

/// Installs the `tracing_subscriber` registry, text or JSON depending on
/// `LogFormat` (mirrors `otlp2parquet-server::init::init_tracing`).
pub fn init_tracing(config: &locus_config::ServerConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.log_format {
        locus_config::LogFormat::Json => registry.with(fmt::layer().json()).init(),
        locus_config::LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}
