//! Pluggable retry policy for network fetches.

use std::time::Duration;

use chat_core::ExponentialBackoff;

use crate::api::ApiError;

/// Decides whether and when a failed fetch is retried.
pub trait RetryPolicy: Send + Sync {
    /// Whether retry number `attempt` (0-based) should run after `error`.
    fn should_retry(&self, attempt: u32, error: &ApiError) -> bool;

    /// How long to wait before retry number `attempt`.
    fn retry_timeout(&self, attempt: u32, error: &ApiError) -> Duration;
}

/// Default policy: exponential backoff over retryable errors, bounded
/// attempt count.
pub struct DefaultRetryPolicy {
    backoff: ExponentialBackoff,
    max_attempts: u32,
}

impl DefaultRetryPolicy {
    /// Create a policy over a backoff curve with an attempt cap.
    pub fn new(backoff: ExponentialBackoff, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts,
        }
    }
}

impl Default for DefaultRetryPolicy {
    /// Three retries over the default backoff curve.
    fn default() -> Self {
        Self::new(ExponentialBackoff::default(), 3)
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn should_retry(&self, attempt: u32, error: &ApiError) -> bool {
        attempt < self.max_attempts && error.retryable()
    }

    fn retry_timeout(&self, attempt: u32, _error: &ApiError) -> Duration {
        self.backoff.delay(attempt)
    }
}

/// Run a fetch under a retry policy.
pub(crate) async fn with_retries<T, F, Fut>(
    policy: &dyn RetryPolicy,
    call: F,
) -> Result<T, ApiError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if policy.should_retry(attempt, &error) => {
                let delay = policy.retry_timeout(attempt, &error);
                tracing::debug!(attempt, ?delay, %error, "retrying failed request");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
