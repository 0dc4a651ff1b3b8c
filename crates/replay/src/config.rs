//! Replay driver configuration.

use std::time::Duration;

use shuttle_chain::{GasParams, RetryPolicy};

/// Revert reason the destination uses for ranges it already holds.
pub const DEFAULT_IDEMPOTENCE_SIGNAL: &str = "already migrated";

/// Replay driver configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Entities per destination call (default: 100).
    pub batch_size: usize,
    /// First entity index of a fresh run (default: 0).
    pub start: Option<usize>,
    /// Entity index to stop at, exclusive.
    pub end: Option<usize>,
    /// Continue from stored progress.
    pub resume: bool,
    /// Plan and encode without sending or persisting anything.
    pub dry_run: bool,
    /// Confirmations required per batch (default: 1).
    pub confirmations: u64,
    /// How long to wait for the confirmations (default: 5m).
    pub confirmation_timeout: Duration,
    /// Attempts and backoff per batch.
    pub retry: RetryPolicy,
    /// Revert reason fragments that mean the batch is already applied.
    pub idempotence_signals: Vec<String>,
    /// Gas overrides for every call.
    pub gas: GasParams,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            start: None,
            end: None,
            resume: false,
            dry_run: false,
            confirmations: 1,
            confirmation_timeout: Duration::from_secs(300),
            retry: RetryPolicy::default(),
            idempotence_signals: vec![DEFAULT_IDEMPOTENCE_SIGNAL.to_string()],
            gas: GasParams::default(),
        }
    }
}

impl ReplayConfig {
    /// Creates a new builder for configuring a replay.
    pub fn builder() -> ReplayConfigBuilder {
        ReplayConfigBuilder::default()
    }
}

/// Builder for [`ReplayConfig`].
#[derive(Clone, Debug, Default)]
pub struct ReplayConfigBuilder {
    config: ReplayConfig,
}

impl ReplayConfigBuilder {
    /// Sets the batch size.
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Sets the first entity index of a fresh run.
    pub const fn start(mut self, start: Option<usize>) -> Self {
        self.config.start = start;
        self
    }

    /// Sets the exclusive end index.
    pub const fn end(mut self, end: Option<usize>) -> Self {
        self.config.end = end;
        self
    }

    /// Allows continuing from stored progress.
    pub const fn resume(mut self, resume: bool) -> Self {
        self.config.resume = resume;
        self
    }

    /// Enables dry-run mode.
    pub const fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Sets the confirmations required per batch.
    pub const fn confirmations(mut self, confirmations: u64) -> Self {
        self.config.confirmations = confirmations;
        self
    }

    /// Sets the confirmation timeout.
    pub const fn confirmation_timeout(mut self, confirmation_timeout: Duration) -> Self {
        self.config.confirmation_timeout = confirmation_timeout;
        self
    }

    /// Sets the per-batch retry policy.
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Replaces the idempotence signals.
    pub fn idempotence_signals(mut self, signals: Vec<String>) -> Self {
        self.config.idempotence_signals = signals;
        self
    }

    /// Sets the gas overrides.
    pub const fn gas(mut self, gas: GasParams) -> Self {
        self.config.gas = gas;
        self
    }

    /// Builds the [`ReplayConfig`].
    pub fn build(self) -> ReplayConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default() {
        let config = ReplayConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.confirmations, 1);
        assert_eq!(config.idempotence_signals, vec!["already migrated".to_string()]);
        assert!(!config.resume);
        assert!(!config.dry_run);
        assert_eq!(config.start, None);
    }

    #[test]
    fn builder_chaining() {
        let config = ReplayConfig::builder()
            .batch_size(2)
            .start(Some(100))
            .end(Some(150))
            .resume(true)
            .confirmations(3)
            .confirmation_timeout(Duration::from_secs(9))
            .gas(GasParams { gas_limit: Some(3_000_000), ..Default::default() })
            .build();
        assert_eq!(config.batch_size, 2);
        assert_eq!(config.start, Some(100));
        assert_eq!(config.end, Some(150));
        assert!(config.resume);
        assert_eq!(config.confirmations, 3);
        assert_eq!(config.confirmation_timeout, Duration::from_secs(9));
        assert_eq!(config.gas.gas_limit, Some(3_000_000));
    }
}
