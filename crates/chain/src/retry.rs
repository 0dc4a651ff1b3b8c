//! Bounded exponential backoff for transient chain failures.

use std::{future::Future, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{ChainError, Retryable};

/// Retry policy applied to every chain interaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (default: 5).
    pub max_attempts: u32,
    /// Delay before the second attempt (default: 500ms).
    pub initial_backoff: Duration,
    /// Upper bound on any single delay (default: 30s).
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Sets the total number of attempts. Zero is treated as one.
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the first backoff delay.
    pub const fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    /// Sets the maximum backoff delay.
    pub const fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Delay after the failed `attempt` (1-based): `initial * 2^(attempt - 1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        self.initial_backoff.saturating_mul(1u32 << shift).min(self.max_backoff)
    }
}

/// Runs `op` until it succeeds or fails with an error the policy does not retry.
///
/// Cancellation is observed both while `op` is in flight and during backoff sleeps, and
/// surfaces as [`ChainError::Cancelled`].
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, ChainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChainError::Cancelled),
            result = op() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient chain error, retrying"
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(ChainError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
