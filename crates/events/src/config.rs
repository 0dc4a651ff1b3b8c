//! Event aggregator configuration.

use shuttle_chain::RetryPolicy;

/// Event aggregator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventAggregatorConfig {
    /// First block to replay from, usually the contract's deployment block (default: 0).
    pub from_block: u64,
    /// Blocks per log query (default: 2000).
    pub window_size: u64,
    /// Blocks shared by consecutive windows (default: 10).
    pub overlap: u64,
    /// Retry policy for each window query.
    pub retry: RetryPolicy,
}

impl Default for EventAggregatorConfig {
    fn default() -> Self {
        Self { from_block: 0, window_size: 2_000, overlap: 10, retry: RetryPolicy::default() }
    }
}

impl EventAggregatorConfig {
    /// Creates a new builder for configuring an event aggregator.
    pub fn builder() -> EventAggregatorConfigBuilder {
        EventAggregatorConfigBuilder::default()
    }
}

/// Builder for [`EventAggregatorConfig`].
#[derive(Clone, Debug, Default)]
pub struct EventAggregatorConfigBuilder {
    config: EventAggregatorConfig,
}

impl EventAggregatorConfigBuilder {
    /// Sets the first block to replay from.
    pub const fn from_block(mut self, from_block: u64) -> Self {
        self.config.from_block = from_block;
        self
    }

    /// Sets the number of blocks per log query.
    pub const fn window_size(mut self, window_size: u64) -> Self {
        self.config.window_size = window_size;
        self
    }

    /// Sets the number of blocks consecutive windows share.
    pub const fn overlap(mut self, overlap: u64) -> Self {
        self.config.overlap = overlap;
        self
    }

    /// Sets the retry policy for window queries.
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Builds the [`EventAggregatorConfig`].
    pub const fn build(self) -> EventAggregatorConfig {
        self.config
    }
}
