//! The versioned snapshot bundle.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{ChannelRecord, DelegateRecord, EntityKey, PrimitiveError, StakerRecord, decimal};

/// Snapshot document format understood by this release.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Immutable point-in-time reconstruction of the state to migrate.
///
/// Epoch-indexed sequences are stored zero-based: index `i` holds epoch `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Document format version.
    pub format_version: u32,
    /// Free-form label chosen by the operator.
    pub label: String,
    /// Block every live read was made at.
    pub source_block: u64,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Number of staking epochs captured.
    pub epoch_count: u64,
    /// Active channels, ascending by key.
    pub channels: Vec<ChannelRecord>,
    /// Active delegates, ascending by `(channel, delegate)`.
    pub delegates: Vec<DelegateRecord>,
    /// Stakers, ascending by key.
    pub stakers: Vec<StakerRecord>,
    /// Staked weight per epoch for each staker.
    #[serde(with = "decimal::u256_table")]
    pub per_epoch_staked_weight: BTreeMap<EntityKey, Vec<U256>>,
    /// Rewards distributed per epoch.
    #[serde(with = "decimal::u256_seq")]
    pub epoch_rewards: Vec<U256>,
    /// Total staked weight per epoch.
    #[serde(with = "decimal::u256_seq")]
    pub epoch_to_total_staked_weight: Vec<U256>,
}

impl Snapshot {
    /// Creates an empty snapshot for `epoch_count` epochs taken at `source_block`.
    pub fn empty(label: impl Into<String>, source_block: u64, epoch_count: u64) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            label: label.into(),
            source_block,
            created_at: 0,
            epoch_count,
            channels: Vec::new(),
            delegates: Vec::new(),
            stakers: Vec::new(),
            per_epoch_staked_weight: BTreeMap::new(),
            epoch_rewards: Vec::new(),
            epoch_to_total_staked_weight: Vec::new(),
        }
    }

    /// Parses a snapshot document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, PrimitiveError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Renders the snapshot as a pretty-printed document.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, PrimitiveError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Returns the per-epoch staked weight of `key`, epoch 1 first.
    pub fn staker_epoch_weights(&self, key: &EntityKey) -> Option<&[U256]> {
        self.per_epoch_staked_weight.get(key).map(Vec::as_slice)
    }

    /// Looks up a channel by key. Channels are sorted, so this is a binary search.
    pub fn channel(&self, key: &EntityKey) -> Option<&ChannelRecord> {
        self.channels.binary_search_by(|c| c.key.cmp(key)).ok().map(|i| &self.channels[i])
    }

    /// Returns `true` if `key` is in the channel collection.
    pub fn contains_channel(&self, key: &EntityKey) -> bool {
        self.channels.iter().any(|c| &c.key == key)
    }

    /// Returns `true` if `key` is in the staker collection.
    pub fn contains_staker(&self, key: &EntityKey) -> bool {
        self.stakers.iter().any(|s| &s.key == key)
    }

    /// Rewards of a one-based `epoch`.
    pub fn epoch_reward(&self, epoch: u64) -> Option<U256> {
        epoch.checked_sub(1).and_then(|i| self.epoch_rewards.get(i as usize)).copied()
    }
}
