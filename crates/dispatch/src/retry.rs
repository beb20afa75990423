//! Generic retry with a fixed delay.
//!
//! Attempts are sequential; the delay is a flat sleep between attempts,
//! not an exponential backoff.

use anyhow::Result;
use std::time::Duration;

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum total attempts (the first call counts as one).
    pub max_attempts: u32,
    /// Fixed delay slept between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Repeatedly invoke `op` until it succeeds or the policy is spent.
///
/// On failure, if `retry_if` holds and attempts remain, sleeps the fixed
/// delay and retries; otherwise the last error propagates unchanged. An
/// error rejected by `retry_if` propagates immediately with zero sleeps.
pub async fn with_retry<T, F, Fut, P>(mut op: F, retry_if: P, policy: RetryPolicy) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&anyhow::Error) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !retry_if(&error) || attempt >= policy.max_attempts {
                    return Err(error);
                }
                tracing::warn!(attempt, "operation failed, retrying: {error:#}");
                tokio::time::sleep(policy.delay).await;
            }
        }
    }
}
