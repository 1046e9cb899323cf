//! Periodic pipeline trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::WorkerConfig;
use crate::retry::FailureTracker;
use crate::runner::{PipelineRunner, TriggerOutcome};

/// Consecutive failures logged at error level before suppression.
const MAX_LOGGED_FAILURES: u32 = 3;

/// Fires the runner on a fixed interval until shut down.
pub struct Scheduler {
    runner: Arc<PipelineRunner>,
    initial_delay: Duration,
    interval: Duration,
}

impl Scheduler {
    pub fn new(runner: Arc<PipelineRunner>, initial_delay: Duration, interval: Duration) -> Self {
        Self {
            runner,
            initial_delay,
            interval,
        }
    }

    pub fn from_config(runner: Arc<PipelineRunner>, config: &WorkerConfig) -> Self {
        Self::new(runner, config.initial_delay, config.run_interval)
    }

    /// Run until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting pipeline scheduler (initial delay: {:?}, interval: {:?})",
            self.initial_delay, self.interval
        );

        tokio::select! {
            _ = tokio::time::sleep(self.initial_delay) => {}
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("Shutdown signal received before first run");
                return;
            }
        }

        let mut ticker = tokio::time::interval(self.interval);
        // A run longer than the interval must not cause a burst of catch-up ticks
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = FailureTracker::new(MAX_LOGGED_FAILURES);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick(&mut failures).await;
                }
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Shutdown signal received, stopping scheduler");
                    break;
                }
            }
        }
    }

    async fn tick(&self, failures: &mut FailureTracker) {
        match self.runner.try_run().await {
            Ok(TriggerOutcome::Completed(summary)) => {
                failures.record_success();
                debug!(
                    processed = summary.processed,
                    articles = summary.articles,
                    errors = summary.errors,
                    "Scheduled run complete"
                );
            }
            Ok(TriggerOutcome::AlreadyRunning) => {
                debug!("Scheduled tick skipped, a run is in progress");
            }
            Err(e) => {
                if failures.record_failure() {
                    error!(
                        failures = failures.failure_count(),
                        "Scheduled pipeline run failed: {}", e
                    );
                }
            }
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
