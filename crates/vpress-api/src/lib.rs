//! Axum HTTP API for the video-to-article pipeline.
//!
//! This crate provides:
//! - Authenticated trigger, recovery and status routes over the shared runner
//! - Health and readiness checks
//! - Prometheus metrics and request logging

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use security::{TriggerAuth, TriggerSecret};
pub use state::AppState;
