//! API routes.

use axum::body::Body;
use axum::http::Request;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, pipeline_status, ready, reprocess_pipeline, run_pipeline};
use crate::metrics::metrics_middleware;
use crate::middleware::{create_rate_limiter, rate_limit_middleware, request_id, request_logging};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let rate_limiter = create_rate_limiter(state.config.trigger_rate_limit_rps);

    let pipeline_routes = Router::new()
        // Schedulers may only be able to issue GETs
        .route("/pipeline/run", get(run_pipeline).post(run_pipeline))
        .route("/pipeline/reprocess", post(reprocess_pipeline))
        .route("/pipeline/status", get(pipeline_status))
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", pipeline_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        // Span without the query string, which may carry the secret
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}
