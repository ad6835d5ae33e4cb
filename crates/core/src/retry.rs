//! Linear backoff retry utility
//!
//! Retries a fallible async operation, waiting `retry_number * base_delay`
//! (capped at `max_delay`) between attempts. Dropping the returned future
//! cancels the in-flight attempt and any pending backoff sleep.
//!
//! # Examples
//!
//! ```
//! use movie_catalog_core::retry::{RetryPolicy, retry_with_backoff};
//!
//! async fn fallible_operation() -> Result<String, std::io::Error> {
//!     Ok("success".to_string())
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let result = retry_with_backoff(
//!     || async { fallible_operation().await },
//!     RetryPolicy::default(),
//!     |err: &std::io::Error| err.kind() == std::io::ErrorKind::ConnectionRefused,
//! ).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry policy configuration for linear backoff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 means no retries, only initial attempt)
    pub max_retries: u32,

    /// Delay step in milliseconds; the n-th retry waits `n * base_delay_ms`
    pub base_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    /// - max_retries: 3
    /// - base_delay_ms: 100
    /// - max_delay_ms: 5000
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom parameters
    ///
    /// # Examples
    ///
    /// ```
    /// use movie_catalog_core::retry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::new(5, 200, 10000);
    /// assert_eq!(policy.max_retries, 5);
    /// assert_eq!(policy.base_delay_ms, 200);
    /// ```
    pub fn new(max_retries: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Total number of attempts this policy allows (initial + retries)
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the given retry (1-indexed): `retry * base`, capped
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let linear = self.base_delay_ms.saturating_mul(u64::from(retry));
        Duration::from_millis(linear.min(self.max_delay_ms))
    }
}

/// Retries an async operation with linear backoff
///
/// Executes the provided async closure and retries on failure according to the
/// retry policy. Only retries when `is_retryable` returns true for the error;
/// a non-retryable error is returned immediately.
///
/// # Examples
///
/// ```
/// use movie_catalog_core::retry::{RetryPolicy, retry_with_backoff};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut attempt = 0;
/// let result = retry_with_backoff(
///     || {
///         attempt += 1;
///         let current = attempt;
///         async move {
///             if current < 3 {
///                 Err("temporary failure")
///             } else {
///                 Ok("success")
///             }
///         }
///     },
///     RetryPolicy::new(3, 1, 10),
///     |_: &&str| true,
/// ).await;
///
/// assert!(result.is_ok());
/// # Ok(())
/// # }
/// ```
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    mut operation: F,
    policy: RetryPolicy,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut retry = 0;

    loop {
        match operation().await {
            Ok(result) => {
                tracing::debug!(
                    attempt = retry + 1,
                    max_attempts = policy.max_attempts(),
                    "Operation succeeded"
                );
                return Ok(result);
            }
            Err(error) => {
                if !is_retryable(&error) {
                    tracing::debug!(
                        attempt = retry + 1,
                        "Error is not retryable, failing immediately"
                    );
                    return Err(error);
                }

                if retry >= policy.max_retries {
                    tracing::warn!(
                        attempts = retry + 1,
                        max_retries = policy.max_retries,
                        "All retry attempts exhausted"
                    );
                    return Err(error);
                }

                retry += 1;
                let delay = policy.delay_for_retry(retry);
                tracing::debug!(
                    retry = retry,
                    delay_ms = delay.as_millis() as u64,
                    max_retries = policy.max_retries,
                    "Retrying after delay"
                );

                sleep(delay).await;
            }
        }
    }
}
