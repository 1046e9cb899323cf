//! Worker error types.

use thiserror::Error;
use vpress_models::VideoStatus;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Transcript fetch failed: {0}")]
    TranscriptFailed(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Generator not configured: {0}")]
    GeneratorUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Media import failed: {0}")]
    MediaFailed(String),

    #[error("Illegal status transition {from} -> {to}")]
    InvalidTransition { from: VideoStatus, to: VideoStatus },

    #[error("Store error: {0}")]
    Store(#[from] vpress_store::StoreError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn discovery_failed(msg: impl Into<String>) -> Self {
        Self::DiscoveryFailed(msg.into())
    }

    pub fn transcript_failed(msg: impl Into<String>) -> Self {
        Self::TranscriptFailed(msg.into())
    }

    pub fn generation_failed(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    pub fn media_failed(msg: impl Into<String>) -> Self {
        Self::MediaFailed(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Map a non-success HTTP status from an external service.
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => Self::RateLimited(message),
            _ => Self::Upstream { status, message },
        }
    }

    /// HTTP status of the failure, when it came from one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            WorkerError::RateLimited(_) => Some(429),
            WorkerError::Upstream { status, .. } => Some(*status),
            WorkerError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Rate limiting or a server-side 5xx from a generative service.
    ///
    /// The article generator retries only these.
    pub fn is_transient_service_error(&self) -> bool {
        match self {
            WorkerError::RateLimited(_) => true,
            WorkerError::Upstream { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }

    /// Transport-level failures, timeouts and transient service errors.
    ///
    /// Transcript strategies retry on these before giving up.
    pub fn is_transient_network_error(&self) -> bool {
        match self {
            WorkerError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            WorkerError::Timeout(_) => true,
            WorkerError::Store(e) => e.is_retryable(),
            _ => self.is_transient_service_error(),
        }
    }

    /// The failure means the generator is not set up, not that it failed.
    pub fn is_generator_unavailable(&self) -> bool {
        matches!(self, WorkerError::GeneratorUnavailable(_))
    }
}
