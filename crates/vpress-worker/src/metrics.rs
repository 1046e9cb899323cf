//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Runs
    pub const RUNS_TOTAL: &str = "vpress_pipeline_runs_total";
    pub const RUNS_SKIPPED_TOTAL: &str = "vpress_pipeline_runs_skipped_total";
    pub const RUN_DURATION_SECONDS: &str = "vpress_pipeline_run_duration_seconds";

    // Per-video outcomes
    pub const VIDEOS_PROCESSED_TOTAL: &str = "vpress_videos_processed_total";
    pub const ARTICLES_CREATED_TOTAL: &str = "vpress_articles_created_total";
    pub const ERRORS_TOTAL: &str = "vpress_pipeline_errors_total";

    // Stages
    pub const TRANSCRIPTS_TOTAL: &str = "vpress_transcripts_total";
    pub const GENERATION_DURATION_SECONDS: &str = "vpress_generation_duration_seconds";
    pub const THUMBNAILS_TOTAL: &str = "vpress_thumbnails_total";
}

/// Record a finished run. `outcome` is `completed`, `timed_out` or `failed`.
pub fn record_run(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::RUNS_TOTAL, &labels).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a trigger that found a run already in progress.
pub fn record_run_skipped() {
    counter!(names::RUNS_SKIPPED_TOTAL).increment(1);
}

pub fn record_video_processed(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::VIDEOS_PROCESSED_TOTAL, &labels).increment(1);
}

pub fn record_article_created(source: &str) {
    let labels = [("source", source.to_string())];
    counter!(names::ARTICLES_CREATED_TOTAL, &labels).increment(1);
}

/// Record a counted pipeline error at `stage`.
pub fn record_error(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::ERRORS_TOTAL, &labels).increment(1);
}

/// Record a transcript lookup; `strategy` is `none` when nothing was found.
pub fn record_transcript(strategy: &str) {
    let labels = [("strategy", strategy.to_string())];
    counter!(names::TRANSCRIPTS_TOTAL, &labels).increment(1);
}

pub fn record_generation(provider: &str, success: bool, duration_secs: f64) {
    let labels = [
        ("provider", provider.to_string()),
        ("status", if success { "success" } else { "error" }.to_string()),
    ];
    histogram!(names::GENERATION_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_thumbnail(success: bool) {
    let labels = [("status", if success { "imported" } else { "skipped" }.to_string())];
    counter!(names::THUMBNAILS_TOTAL, &labels).increment(1);
}
