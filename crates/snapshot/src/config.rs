//! Snapshot builder configuration.

use alloy::primitives::Address;
use shuttle_chain::{RetryPolicy, StakingLayout};
use shuttle_events::EventAggregatorConfig;

/// Snapshot builder configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Source core contract.
    pub core: Address,
    /// Free-form label written into the snapshot.
    pub label: String,
    /// Number of staking epochs to capture.
    pub epochs: u64,
    /// Storage layout of per-epoch staked weight.
    pub layout: StakingLayout,
    /// Live reads in flight at once (default: 8).
    pub fan_out: usize,
    /// Blocks behind head to pin the snapshot at (default: 0).
    pub confirmation_lag: u64,
    /// Retry policy for every live read.
    pub retry: RetryPolicy,
    /// Event replay configuration.
    pub events: EventAggregatorConfig,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            core: Address::ZERO,
            label: String::from("snapshot"),
            epochs: 0,
            layout: StakingLayout::new(0, 0),
            fan_out: 8,
            confirmation_lag: 0,
            retry: RetryPolicy::default(),
            events: EventAggregatorConfig::default(),
        }
    }
}

impl SnapshotConfig {
    /// Creates a new builder for configuring a snapshot build.
    pub fn builder() -> SnapshotConfigBuilder {
        SnapshotConfigBuilder::default()
    }
}

/// Builder for [`SnapshotConfig`].
#[derive(Clone, Debug, Default)]
pub struct SnapshotConfigBuilder {
    config: SnapshotConfig,
}

impl SnapshotConfigBuilder {
    /// Sets the source core contract.
    pub const fn core(mut self, core: Address) -> Self {
        self.config.core = core;
        self
    }

    /// Sets the snapshot label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config.label = label.into();
        self
    }

    /// Sets the number of epochs to capture.
    pub const fn epochs(mut self, epochs: u64) -> Self {
        self.config.epochs = epochs;
        self
    }

    /// Sets the staking storage layout.
    pub const fn layout(mut self, layout: StakingLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Sets the number of live reads in flight.
    pub const fn fan_out(mut self, fan_out: usize) -> Self {
        self.config.fan_out = fan_out;
        self
    }

    /// Sets how many blocks behind head the snapshot is pinned.
    pub const fn confirmation_lag(mut self, confirmation_lag: u64) -> Self {
        self.config.confirmation_lag = confirmation_lag;
        self
    }

    /// Sets the live read retry policy.
    pub const fn retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    /// Sets the event replay configuration.
    pub const fn events(mut self, events: EventAggregatorConfig) -> Self {
        self.config.events = events;
        self
    }

    /// Builds the [`SnapshotConfig`].
    pub fn build(self) -> SnapshotConfig {
        self.config
    }
}
