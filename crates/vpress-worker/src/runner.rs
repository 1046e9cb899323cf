//! Run latch and deadline around the pipeline.
//!
//! Every trigger (timer, HTTP, recovery) goes through one `PipelineRunner`.
//! A trigger that arrives while a run is active is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use scopeguard::ScopeGuard;
use serde::Serialize;
use tracing::{error, info, warn};
use vpress_models::{RecoverySummary, RunSummary, VideoStatus};

use crate::error::WorkerResult;
use crate::metrics;
use crate::pipeline::{Pipeline, RunCounters};

/// Outcome of a trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome<T> {
    Completed(T),
    /// Another run held the latch; nothing was started
    AlreadyRunning,
}

impl<T> TriggerOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TriggerOutcome::Completed(_))
    }
}

/// The last finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub timed_out: bool,
}

/// Point-in-time runner state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerStatus {
    pub running: bool,
    pub last_run: Option<LastRun>,
}

/// Error message stored on a video whose run was aborted.
pub const DEADLINE_EXCEEDED: &str = "run deadline exceeded";

fn release_latch(flag: &AtomicBool) {
    flag.store(false, Ordering::SeqCst);
}

pub struct PipelineRunner {
    pipeline: Pipeline,
    running: AtomicBool,
    deadline: Duration,
    last_run: Mutex<Option<LastRun>>,
}

impl PipelineRunner {
    pub fn new(pipeline: Pipeline, deadline: Duration) -> Self {
        Self {
            pipeline,
            running: AtomicBool::new(false),
            deadline,
            last_run: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Take the latch; it is released when the returned guard drops.
    fn acquire(&self) -> Option<ScopeGuard<&AtomicBool, fn(&AtomicBool)>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;

        Some(scopeguard::guard(&self.running, release_latch as fn(&AtomicBool)))
    }

    /// Run the pipeline unless a run is already active.
    pub async fn try_run(&self) -> WorkerResult<TriggerOutcome<RunSummary>> {
        let Some(_latch) = self.acquire() else {
            info!("Pipeline run already in progress, skipping trigger");
            metrics::record_run_skipped();
            return Ok(TriggerOutcome::AlreadyRunning);
        };

        self.run_with_deadline().await.map(TriggerOutcome::Completed)
    }

    /// Delete every recoverable video record, then run.
    ///
    /// The latch is held across both steps so no other run can observe
    /// the half-cleaned state.
    pub async fn recover(&self) -> WorkerResult<TriggerOutcome<RecoverySummary>> {
        let Some(_latch) = self.acquire() else {
            info!("Pipeline run already in progress, skipping recovery");
            metrics::record_run_skipped();
            return Ok(TriggerOutcome::AlreadyRunning);
        };

        let videos = self.pipeline.videos();
        let stale = videos.find_by_status(&VideoStatus::RECOVERABLE).await?;

        let mut deleted = 0u32;
        for record in &stale {
            match videos.delete(&record.id).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(
                    video_id = %record.video_id,
                    status = %record.status,
                    "Could not delete video record for reprocessing: {}", e
                ),
            }
        }
        info!(deleted, found = stale.len(), "Removed recoverable video records");

        let pipeline = self.run_with_deadline().await?;
        Ok(TriggerOutcome::Completed(RecoverySummary { deleted, pipeline }))
    }

    /// One run bounded by the deadline. Caller holds the latch.
    async fn run_with_deadline(&self) -> WorkerResult<RunSummary> {
        let counters = RunCounters::new();
        let started = Instant::now();

        let (result, timed_out) =
            match tokio::time::timeout(self.deadline, self.pipeline.run(&counters)).await {
                Ok(result) => (result, false),
                Err(_) => {
                    counters.record_error("deadline");
                    error!(deadline = ?self.deadline, "Pipeline run exceeded its deadline, aborted");
                    self.fail_in_flight(&counters).await;
                    (Ok(counters.snapshot()), true)
                }
            };

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(summary) => {
                let outcome = if timed_out { "timed_out" } else { "completed" };
                metrics::record_run(outcome, elapsed);
                self.remember(LastRun {
                    finished_at: Utc::now(),
                    summary: *summary,
                    timed_out,
                });
                info!(
                    processed = summary.processed,
                    articles = summary.articles,
                    errors = summary.errors,
                    duration_secs = elapsed,
                    "Pipeline run finished"
                );
            }
            Err(e) => {
                metrics::record_run("failed", elapsed);
                error!("Pipeline run failed: {}", e);
            }
        }

        result
    }

    /// Mark the video an aborted run was driving as failed, so recovery
    /// picks it up instead of it staying known and unfinished.
    async fn fail_in_flight(&self, counters: &RunCounters) {
        let Some(id) = counters.take_in_flight() else {
            return;
        };
        match self.pipeline.videos().fail(&id, DEADLINE_EXCEEDED).await {
            Ok(()) => warn!(doc_id = %id, "Marked in-flight video failed after deadline"),
            Err(e) => error!(doc_id = %id, "Could not mark in-flight video failed: {}", e),
        }
    }

    fn remember(&self, run: LastRun) {
        let mut last = self.last_run.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(run);
    }

    pub fn status(&self) -> RunnerStatus {
        let last_run = self
            .last_run
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        RunnerStatus {
            running: self.is_running(),
            last_run,
        }
    }
}
