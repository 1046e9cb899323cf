//! Axum API server binary.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vpress_api::{create_router, metrics, ApiConfig, AppState};
use vpress_worker::{build_services, Scheduler, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

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

    info!("Starting vpress-api");

    let config = ApiConfig::from_env();
    info!("API config: {:?}", config);
    if config.trigger_secret.is_empty() {
        if config.is_production() {
            anyhow::bail!("PIPELINE_TRIGGER_SECRET must be set in production");
        }
        warn!("PIPELINE_TRIGGER_SECRET is not set; pipeline routes will reject every call");
    }

    let worker_config = WorkerConfig::from_env();
    let services = build_services(&worker_config).context("Failed to build pipeline services")?;
    let runner = services.runner.clone();
    let state = AppState::new(config.clone(), services);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("Failed to install Prometheus recorder")?)
    } else {
        None
    };

    // The scheduler shares the runner, so timer and HTTP triggers never overlap
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = if worker_config.scheduler_enabled {
        let scheduler = Scheduler::from_config(runner, &worker_config);
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    } else {
        info!("In-process scheduler disabled");
        None
    };

    let app = create_router(state, metrics_handle);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("Server error")?;

    if let Some(handle) = scheduler {
        handle.await.ok();
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    tokio::signal::ctrl_c().await.ok();
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);
}
