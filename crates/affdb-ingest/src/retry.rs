//! Fixed-delay retry for transient source and store failures.
//!
//! Only errors whose [`Transient::is_transient`] returns `true` are retried;
//! everything else is handed back on the first failure.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::error::Transient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure. `0` disables retries.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// No retries, no sleeping.
    #[must_use]
    pub fn none() -> Self {
        Self::new(0, 0)
    }
}

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// `policy.max_retries` extra attempts have been spent.
///
/// With `max_retries = 3` the operation runs at most 4 times, sleeping
/// `policy.delay` before each retry.
///
/// # Errors
///
/// Returns the first non-transient error, or the last transient one once
/// retries are exhausted.
pub async fn retry_transient<T, E, F, Fut>(
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: Transient + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= policy.max_retries {
                    return Err(err);
                }
                attempt += 1;
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = u64::try_from(policy.delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient failure, retrying after fixed delay"
                );
            }
        }

        if !policy.delay.is_zero() {
            tokio::time::sleep(policy.delay).await;
        }
    }
}
