//! Retry utilities with exponential backoff.
//!
//! One shared retry loop for flaky external services, parameterized by a
//! predicate deciding which errors are worth another attempt.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed: retries exhausted or the error was not retryable.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }

    /// Number of attempts made before a failure was returned.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryResult::Success(_) => None,
            RetryResult::Failed { attempts, .. } => Some(*attempts),
        }
    }

    /// Convert into a plain `Result`, dropping the attempt count.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Execute an async operation, retrying errors accepted by `is_retryable`.
///
/// ```ignore
/// let config = RetryConfig::new("openai").with_max_retries(3);
/// let result = retry_async(&config, WorkerError::is_transient_service_error, || async {
///     backend.complete(&request).await
/// })
/// .await
/// .into_result();
/// ```
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    is_retryable: P,
    operation: F,
) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < config.max_retries && is_retryable(&e) => {
                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    operation = %config.operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Transient failure, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                debug!(
                    operation = %config.operation_name,
                    attempts = attempt + 1,
                    "Giving up: {}",
                    e
                );
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                };
            }
        }
    }
}

/// State tracker for repeated operations that may fail intermittently.
///
/// Used by the scheduler so a persistently broken dependency does not
/// flood the logs every interval.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a successful operation (resets failure count).
    pub fn record_success(&mut self) {
        if self.consecutive_failures > 0 && self.suppressed {
            debug!(
                "Operation recovered after {} consecutive failures",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
        self.suppressed = false;
    }

    /// Record a failed operation.
    ///
    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures += 1;

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else {
            if !self.suppressed {
                self.suppressed = true;
                warn!(
                    "Suppressing further failure logs after {} consecutive failures",
                    self.max_logged_failures
                );
            }
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
