//! Pipeline trigger, recovery and status handlers.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::{error, info};
use vpress_models::RunSummary;
use vpress_worker::{RunnerStatus, TriggerOutcome};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::TriggerAuth;
use crate::state::AppState;

/// Trigger response.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub success: bool,
    pub message: String,
    #[serde(flatten)]
    pub summary: RunSummary,
}

/// Recovery response.
#[derive(Debug, Serialize)]
pub struct ReprocessResponse {
    pub success: bool,
    pub message: String,
    pub deleted: u32,
    pub pipeline: RunSummary,
}

/// Run the pipeline once and report its counters.
pub async fn run_pipeline(_auth: TriggerAuth, State(state): State<AppState>) -> ApiResult<Json<RunResponse>> {
    info!("Pipeline run requested over HTTP");

    match state.runner.try_run().await {
        Ok(TriggerOutcome::Completed(summary)) => {
            metrics::record_trigger("run", "completed");
            Ok(Json(RunResponse {
                success: true,
                message: format!(
                    "Pipeline complete: {} processed, {} articles, {} errors",
                    summary.processed, summary.articles, summary.errors
                ),
                summary,
            }))
        }
        Ok(TriggerOutcome::AlreadyRunning) => {
            metrics::record_trigger("run", "already_running");
            Err(ApiError::AlreadyRunning)
        }
        Err(e) => {
            metrics::record_trigger("run", "failed");
            error!("Pipeline run failed: {}", e);
            Err(e.into())
        }
    }
}

/// Delete failed and transcript-less videos, then run again.
pub async fn reprocess_pipeline(
    _auth: TriggerAuth,
    State(state): State<AppState>,
) -> ApiResult<Json<ReprocessResponse>> {
    info!("Pipeline recovery requested over HTTP");

    match state.runner.recover().await {
        Ok(TriggerOutcome::Completed(recovery)) => {
            metrics::record_trigger("reprocess", "completed");
            Ok(Json(ReprocessResponse {
                success: true,
                message: format!(
                    "Deleted {} videos for reprocessing; pipeline processed {}",
                    recovery.deleted, recovery.pipeline.processed
                ),
                deleted: recovery.deleted,
                pipeline: recovery.pipeline,
            }))
        }
        Ok(TriggerOutcome::AlreadyRunning) => {
            metrics::record_trigger("reprocess", "already_running");
            Err(ApiError::AlreadyRunning)
        }
        Err(e) => {
            metrics::record_trigger("reprocess", "failed");
            error!("Pipeline recovery failed: {}", e);
            Err(e.into())
        }
    }
}

/// Whether a run is active, and how the last one ended.
pub async fn pipeline_status(_auth: TriggerAuth, State(state): State<AppState>) -> Json<RunnerStatus> {
    Json(state.runner.status())
}
