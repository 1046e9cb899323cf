//! Headless pipeline worker binary.

use std::net::SocketAddr;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpress_worker::{build_services, Scheduler, TriggerOutcome, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vpress=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting vpress-worker");

    if let Ok(port) = std::env::var("METRICS_PORT") {
        let port: u16 = port.trim().parse().context("Invalid METRICS_PORT")?;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Prometheus metrics listening on {}", addr);
    }

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let services = build_services(&config).context("Failed to build pipeline services")?;

    let run_once = std::env::var("WORKER_RUN_ONCE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    if run_once {
        match services.runner.try_run().await? {
            TriggerOutcome::Completed(summary) => info!(
                processed = summary.processed,
                articles = summary.articles,
                errors = summary.errors,
                "Single run complete"
            ),
            TriggerOutcome::AlreadyRunning => warn!("Run skipped, another run is active"),
        }
        return Ok(());
    }

    if !config.scheduler_enabled {
        warn!("Scheduler disabled and WORKER_RUN_ONCE not set; nothing to do");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    Scheduler::from_config(services.runner, &config)
        .run(shutdown_rx)
        .await;

    info!("Worker shutdown complete");
    Ok(())
}
