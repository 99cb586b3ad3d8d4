//! Bounded retry for read-only operations

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::LedgerResult;

/// How often and how patiently a read-only call is retried on transient
/// infrastructure failures. Mutations never go through this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; grows linearly per attempt
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt + 1`, with up to 50% jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .base_backoff
            .checked_mul(attempt.saturating_add(1))
            .unwrap_or(Duration::MAX);
        let jitter_ceiling = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        if jitter_ceiling == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(
            rand::thread_rng().gen_range(0..=jitter_ceiling),
        ))
    }

    /// Run `op`, retrying while it fails with a retryable error
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        operation,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
