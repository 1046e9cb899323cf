//! Run summaries reported to callers.

use serde::{Deserialize, Serialize};

/// Aggregated counters of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunSummary {
    /// Videos for which a record was persisted
    pub processed: u32,
    /// Articles persisted
    pub articles: u32,
    /// Per-video and per-source failures
    pub errors: u32,
}

impl RunSummary {
    /// Summary of a run that had nothing to do.
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Result of the recovery operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoverySummary {
    /// Video records removed so they are rediscovered
    pub deleted: u32,
    /// Summary of the run triggered right after deletion
    pub pipeline: RunSummary,
}
