//! Content store metrics.
//!
//! Request counters by operation and status, latency histograms and
//! retry counters.

use metrics::{counter, histogram};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Total store requests by operation, collection and status.
    pub const REQUESTS_TOTAL: &str = "vpress_store_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "vpress_store_retries_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "vpress_store_latency_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

/// Record metrics for a completed store request.
pub fn record_request(operation: &str, collection: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "collection" => collection.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}
