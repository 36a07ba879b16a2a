use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::ClientError;

/// Bounded exponential backoff.
///
/// Attempt `i` (0-indexed) that fails with a retryable error waits
/// `base_delay * 2^i` before the next one. After `retries` scheduled
/// retries one final attempt runs and its outcome is returned as-is, so a
/// call makes at most `retries + 1` network attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self { retries, base_delay }
    }

    /// A policy that makes exactly one attempt.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    pub async fn run<T, F, Fut>(&self, endpoint: &str, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        for attempt in 0..self.retries {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        endpoint,
                        attempt = attempt + 1,
                        retries = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "remote call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }

        call().await
    }
}
