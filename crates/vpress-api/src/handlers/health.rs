//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness response with per-dependency checks.
#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub checks: ReadyChecks,
}

#[derive(Serialize)]
pub struct ReadyChecks {
    pub store: &'static str,
}

/// Readiness check endpoint. Degraded when the content store is unreachable.
pub async fn ready(State(state): State<AppState>) -> Response {
    let store = match state.store.health_check().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!("Readiness: content store check failed: {}", e);
            "unavailable"
        }
    };

    let healthy = store == "ok";
    let body = ReadyResponse {
        status: if healthy { "ready" } else { "degraded" },
        checks: ReadyChecks { store },
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body)).into_response()
}
