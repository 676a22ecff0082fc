//! Retry with exponential backoff
//!
//! Two backoff strategies share one retry budget: rate-limit errors back off
//! with jitter to spread out competing invocations, other retryable errors
//! back off deterministically. Non-retryable errors propagate immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::Result;

/// Retry budget and base delay for backoff
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure
    pub max_retries: u32,
    /// Base delay; attempt n waits `base * 2^n` (plus jitter when rate limited)
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32, jitter: bool) -> Duration {
        let exponential = self.base_delay.as_secs_f64() * 2f64.powi(attempt as i32);
        let jitter = if jitter {
            rand::thread_rng().gen_range(0.0..1.0)
        } else {
            0.0
        };
        Duration::from_secs_f64(exponential + jitter)
    }
}

/// Run `op`, retrying on rate-limit and retryable errors up to the policy's
/// budget. The final error is returned once the budget is exhausted.
pub async fn retry_with_backoff<T, F, Fut>(policy: &RetryPolicy, op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt >= policy.max_retries || !error.is_retryable() {
            return Err(error);
        }

        let rate_limited = error.is_rate_limit();
        let delay = policy.backoff(attempt, rate_limited);
        if rate_limited {
            warn!(
                "{}: rate limited, waiting {:.2}s before retry ({}/{}): {}",
                op_name,
                delay.as_secs_f64(),
                attempt + 1,
                policy.max_retries + 1,
                error
            );
        } else {
            warn!(
                "{}: retryable error, waiting {:.2}s before retry ({}/{}): {}",
                op_name,
                delay.as_secs_f64(),
                attempt + 1,
                policy.max_retries + 1,
                error
            );
        }
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
