//! Prometheus metrics for the API server.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vpress_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vpress_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vpress_http_requests_in_flight";

    // Triggers
    pub const PIPELINE_TRIGGERS_TOTAL: &str = "vpress_pipeline_triggers_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "vpress_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", path.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an HTTP trigger. `outcome` is `completed`, `already_running` or `failed`.
pub fn record_trigger(kind: &str, outcome: &str) {
    let labels = [("kind", kind.to_string()), ("outcome", outcome.to_string())];
    counter!(names::PIPELINE_TRIGGERS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Metrics middleware for HTTP requests.
///
/// Paths are labelled by their route template; unmatched requests share
/// one label so scanners cannot blow up the cardinality.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
