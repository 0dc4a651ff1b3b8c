//! Channel records.

use alloy::primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{EntityKey, PrimitiveError, decimal};

/// Channel category as encoded by the core contract's `ChannelType` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChannelType {
    /// Protocol owned, pays no interest.
    ProtocolNonInterest,
    /// Protocol promotion channel.
    ProtocolPromotion,
    /// Interest bearing, open subscription.
    InterestBearingOpen,
    /// Interest bearing, mutual subscription.
    InterestBearingMutual,
    /// Expires at `expiryTime`.
    TimeBound,
    /// Subscription gated on token holdings.
    TokenGated,
}

impl ChannelType {
    /// Returns the on-chain `uint8` code.
    pub const fn code(self) -> u8 {
        match self {
            Self::ProtocolNonInterest => 0,
            Self::ProtocolPromotion => 1,
            Self::InterestBearingOpen => 2,
            Self::InterestBearingMutual => 3,
            Self::TimeBound => 4,
            Self::TokenGated => 5,
        }
    }
}

impl TryFrom<u8> for ChannelType {
    type Error = PrimitiveError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::ProtocolNonInterest,
            1 => Self::ProtocolPromotion,
            2 => Self::InterestBearingOpen,
            3 => Self::InterestBearingMutual,
            4 => Self::TimeBound,
            5 => Self::TokenGated,
            other => return Err(PrimitiveError::UnknownChannelType(other)),
        })
    }
}

/// Channel lifecycle state as stored by the core contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Never activated.
    Inactive,
    /// Live and publishing.
    Active,
    /// Deactivated by its owner.
    Deactivated,
    /// Blocked by governance.
    Blocked,
}

impl ChannelState {
    /// Only active channels are carried into a snapshot.
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl TryFrom<u8> for ChannelState {
    type Error = PrimitiveError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Self::Inactive,
            1 => Self::Active,
            2 => Self::Deactivated,
            3 => Self::Blocked,
            other => return Err(PrimitiveError::UnknownChannelState(other)),
        })
    }
}

/// A live channel captured for migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelRecord {
    /// Channel address.
    pub key: EntityKey,
    /// Channel category.
    pub channel_type: ChannelType,
    /// Identity payload from the latest `AddChannel`/`UpdateChannel` event.
    pub identity: Bytes,
    /// Amount the channel contributed to the fee pool.
    #[serde(with = "decimal::u256")]
    pub pool_contribution: U256,
    /// Expiry timestamp, zero for channels that do not expire.
    #[serde(with = "decimal::u256")]
    pub expiry_time: U256,
    /// Number of `UpdateChannel` events observed.
    pub update_counter: u64,
}
