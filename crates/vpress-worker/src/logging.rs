//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for pipeline runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Run logger carrying the run id and the source being processed.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    source: String,
}

impl RunLogger {
    /// Logger for a fresh run with a generated id.
    pub fn new(source: &str) -> Self {
        Self::from_string(&Uuid::new_v4().to_string(), source)
    }

    pub fn from_string(run_id: &str, source: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            source: source.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            source = %self.source,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            source = %self.source,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            source = %self.source,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            source = %self.source,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            source = %self.source,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Span covering the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "pipeline_run",
            run_id = %self.run_id,
            source = %self.source
        )
    }
}
