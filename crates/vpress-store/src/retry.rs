//! Retry policy for store reads.
//!
//! Exponential backoff with full jitter, honoring a server-provided delay
//! on 429. Writes are never retried here: a failed write surfaces to the
//! caller and is left for a later run.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{info_span, warn, Instrument};

use crate::error::{StoreError, StoreResult};
use crate::metrics::record_retry;

// =============================================================================
// Configuration
// =============================================================================

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_retries: std::env::var("STORE_RETRY_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_retries),
            base_delay_ms: std::env::var("STORE_RETRY_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: std::env::var("STORE_RETRY_MAX_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_delay_ms),
        }
    }

    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Execute an async read with retry.
///
/// Retries network failures, 429 and 5xx responses. Everything else
/// returns immediately.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> StoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        let span = info_span!("store_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Store operation failed, retrying: {}",
                    e
                );

                record_retry(operation);
                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| StoreError::request_failed("retry loop exited without a result")))
}

/// Exponential backoff with full jitter, or the server's own delay.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after.min(config.max_delay_ms));
    }

    let exp_delay = config.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp_delay.min(config.max_delay_ms);

    if capped == 0 {
        return Duration::ZERO;
    }

    Duration::from_millis(rand::rng().random_range(0..=capped))
}
