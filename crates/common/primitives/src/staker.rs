//! Staker records.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::{EntityKey, decimal};

/// Staking position of a single user.
///
/// The user's per-epoch staked weight lives in
/// [`Snapshot::per_epoch_staked_weight`](crate::Snapshot::per_epoch_staked_weight), keyed by
/// [`StakerRecord::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakerRecord {
    /// Staker address.
    pub key: EntityKey,
    /// Tokens currently staked.
    #[serde(with = "decimal::u256")]
    pub staked_amount: U256,
    /// Current staked weight.
    #[serde(with = "decimal::u256")]
    pub staked_weight: U256,
    /// Block of the last stake.
    #[serde(with = "decimal::u256")]
    pub last_staked_block: U256,
    /// Block of the last reward claim.
    #[serde(with = "decimal::u256")]
    pub last_claimed_block: U256,
    /// Total rewards claimed so far.
    #[serde(with = "decimal::u256")]
    pub rewards_claimed: U256,
}

impl StakerRecord {
    /// Returns `true` when the position carries no state worth migrating.
    pub fn is_empty(&self) -> bool {
        self.staked_amount.is_zero()
            && self.staked_weight.is_zero()
            && self.rewards_claimed.is_zero()
    }
}
