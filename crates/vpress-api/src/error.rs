//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("A pipeline run is already in progress")]
    AlreadyRunning,

    #[error("Rate limited")]
    RateLimited,

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] vpress_worker::WorkerError),

    #[error("Store error: {0}")]
    Store(#[from] vpress_store::StoreError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::AlreadyRunning => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Pipeline(_) | ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::AlreadyRunning => "already_running",
            ApiError::RateLimited => "rate_limited",
            ApiError::Store(_) => "internal_error",
            ApiError::Pipeline(_) => "pipeline_failed",
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, ApiError::Pipeline(_) | ApiError::Store(_))
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            tracing::error!(code = self.code(), "Request failed: {}", self);
        }

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}
