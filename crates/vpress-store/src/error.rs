//! Content store error types.

use thiserror::Error;

/// Result type for content store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during content store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map an HTTP error status and body to a store error.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            401 | 403 => Self::AuthError(msg),
            404 => Self::NotFound(msg),
            409 => Self::AlreadyExists(msg),
            // Unique-field violations surface as validation errors
            400 if is_uniqueness_violation(&msg) => Self::AlreadyExists(msg),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, msg),
            _ => Self::RequestFailed(msg),
        }
    }

    /// HTTP status this error corresponds to, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            StoreError::AuthError(_) => Some(401),
            StoreError::NotFound(_) => Some(404),
            StoreError::AlreadyExists(_) => Some(409),
            StoreError::RateLimited(_) => Some(429),
            StoreError::ServerError(status, _) => Some(*status),
            StoreError::RequestFailed(_) => Some(400),
            StoreError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            StoreError::RateLimited(_) | StoreError::ServerError(..) => true,
            _ => false,
        }
    }

    /// Suggested delay before retrying, when the server gave one.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            StoreError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// True if the write collided with an existing unique value.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_))
    }
}

fn is_uniqueness_violation(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    body.contains("unique") || body.contains("already exists") || body.contains("duplicate")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(StoreError::from_http_status(404, "x"), StoreError::NotFound(_)));
        assert!(matches!(StoreError::from_http_status(403, "x"), StoreError::AuthError(_)));
        assert!(matches!(StoreError::from_http_status(409, "x"), StoreError::AlreadyExists(_)));
        assert!(matches!(StoreError::from_http_status(429, "x"), StoreError::RateLimited(_)));
        assert!(matches!(StoreError::from_http_status(503, "x"), StoreError::ServerError(503, _)));
        assert!(matches!(StoreError::from_http_status(422, "x"), StoreError::RequestFailed(_)));
    }

    #[test]
    fn test_unique_validation_maps_to_already_exists() {
        let body = r#"{"errors":[{"message":"The following field is invalid: videoId","data":{"errors":[{"message":"Value must be unique"}]}}]}"#;
        assert!(StoreError::from_http_status(400, body).is_already_exists());
        assert!(!StoreError::from_http_status(400, "bad input").is_already_exists());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::from_http_status(500, "x").is_retryable());
        assert!(StoreError::from_http_status(429, "x").is_retryable());
        assert!(!StoreError::from_http_status(400, "x").is_retryable());
        assert!(!StoreError::not_found("videos/1").is_retryable());
    }
}
