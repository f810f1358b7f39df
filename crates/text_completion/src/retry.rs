//! Fixed-delay retry for transient failures
//!
//! Retries an async operation a fixed number of times with a constant pause
//! in between. Only errors reporting themselves as retryable are retried;
//! the last error is returned unchanged once attempts run out.
//!
//! # Example
//!
//! ```rust,ignore
//! use text_completion::retry::{RetryPolicy, retry_fixed};
//!
//! let policy = RetryPolicy::new(3, Duration::from_secs(1));
//! let result = retry_fixed(&policy, || async {
//!     client.send().await
//! }).await;
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CompletionError;

/// Attempt count and constant pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    /// Create a new policy; at least one attempt is always made
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Single attempt, no retries
    #[must_use]
    pub const fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// Trait for errors that can be checked for retryability
pub trait Retryable {
    /// Returns true if this error is retryable
    fn is_retryable(&self) -> bool;
}

impl Retryable for CompletionError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// Retry result containing either success or the last error
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The result of the operation
    pub result: Result<T, E>,
    /// Number of attempts made (1 = no retries, 2 = one retry, etc.)
    pub attempts: u32,
    /// Total time spent including retries
    pub total_duration: Duration,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Check if the operation failed
    #[must_use]
    pub const fn is_err(&self) -> bool {
        self.result.is_err()
    }

    /// Convert to standard Result, discarding metadata
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Execute an async operation under `policy`
///
/// Returns the final result together with the number of attempts made.
#[allow(clippy::cast_possible_truncation)]
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, mut operation: F) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let start = Instant::now();
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(
                        attempts,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Operation succeeded after retries"
                    );
                }
                return RetryResult {
                    result: Ok(value),
                    attempts,
                    total_duration: start.elapsed(),
                };
            },
            Err(err) if !err.is_retryable() => {
                debug!(attempts, error = %err, "Operation failed with non-retryable error");
                return RetryResult {
                    result: Err(err),
                    attempts,
                    total_duration: start.elapsed(),
                };
            },
            Err(err) if attempts >= max_attempts => {
                warn!(attempts, error = %err, "Operation failed after max attempts");
                return RetryResult {
                    result: Err(err),
                    attempts,
                    total_duration: start.elapsed(),
                };
            },
            Err(err) => {
                warn!(
                    attempt = attempts,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            },
        }
    }
}

/// Execute an async operation under `policy`, returning only the Result
pub async fn retry_fixed<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    with_retry(policy, operation).await.into_result()
}
