//! API middleware.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tracing::{info, warn, Span};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;

/// Rate limiter type alias.
pub type GlobalRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a global rate limiter. Zero falls back to one request per second.
pub fn create_rate_limiter(requests_per_second: u32) -> Arc<GlobalRateLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Rate limiting middleware for the trigger routes.
///
/// The limit is global rather than per client: a run is a process-wide
/// resource and the callers are a handful of schedulers.
pub async fn rate_limit_middleware(
    State(rate_limiter): State<Arc<GlobalRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if rate_limiter.check().is_err() {
        warn!(path = %request.uri().path(), "Rate limit exceeded");
        metrics::record_rate_limit_hit(request.uri().path());
        let mut response = ApiError::RateLimited.into_response();
        response
            .headers_mut()
            .insert("Retry-After", axum::http::HeaderValue::from_static("1"));
        return response;
    }

    next.run(request).await
}

/// Request ID middleware.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    // Generate or extract request ID
    let request_id = request
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(request_id.clone());

    Span::current().record("request_id", &request_id);

    let mut response = next.run(request).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-ID", header_value);
    }

    response
}

/// Request logging middleware.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    // Path only: the query may carry the trigger secret
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();

    // Skip health check logging
    if path != "/health" && path != "/healthz" && path != "/ready" {
        info!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed"
        );
    }

    response
}
