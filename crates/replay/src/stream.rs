//! Migration streams: how snapshot collections map onto destination calls.

use std::{fmt, str::FromStr};

use alloy::{
    primitives::{Bytes, U256},
    sol_types::SolCall,
};
use shuttle_chain::{AbiError, AbiSchema, contracts::IMigrationTarget};
use shuttle_planner::BatchRange;
use shuttle_primitives::Snapshot;
use thiserror::Error;

use crate::ReplayError;

/// A destination migration stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Channel records, via `migrateChannelData`.
    Channels,
    /// Delegated senders, via `migrateDelegateData`.
    Delegates,
    /// Staker positions, via `migrateStakerData`.
    Stakers,
    /// Per-user epoch weights, via `migrateUserEpochWeights`.
    EpochWeights,
    /// Global per-epoch aggregates, via `migrateEpochData`.
    Epochs,
}

impl StreamKind {
    /// Every stream, in the order a full migration runs them.
    pub const ALL: [Self; 5] =
        [Self::Channels, Self::Delegates, Self::Stakers, Self::EpochWeights, Self::Epochs];

    /// Command-line and progress-file name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Delegates => "delegates",
            Self::Stakers => "stakers",
            Self::EpochWeights => "epoch-weights",
            Self::Epochs => "epochs",
        }
    }

    /// Signature of the destination function this stream calls.
    pub const fn destination_signature(self) -> &'static str {
        match self {
            Self::Channels => IMigrationTarget::migrateChannelDataCall::SIGNATURE,
            Self::Delegates => IMigrationTarget::migrateDelegateDataCall::SIGNATURE,
            Self::Stakers => IMigrationTarget::migrateStakerDataCall::SIGNATURE,
            Self::EpochWeights => IMigrationTarget::migrateUserEpochWeightsCall::SIGNATURE,
            Self::Epochs => IMigrationTarget::migrateEpochDataCall::SIGNATURE,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognised stream name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stream {0:?} (expected channels, delegates, stakers, epoch-weights or epochs)")]
pub struct UnknownStream(pub String);

impl FromStr for StreamKind {
    type Err = UnknownStream;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStream(s.to_string()))
    }
}

/// Checks that the destination ABI declares the function `kind` calls.
pub fn verify_destination_abi(schema: &AbiSchema, kind: StreamKind) -> Result<(), AbiError> {
    match kind {
        StreamKind::Channels => schema.require_function::<IMigrationTarget::migrateChannelDataCall>(),
        StreamKind::Delegates => {
            schema.require_function::<IMigrationTarget::migrateDelegateDataCall>()
        }
        StreamKind::Stakers => schema.require_function::<IMigrationTarget::migrateStakerDataCall>(),
        StreamKind::EpochWeights => {
            schema.require_function::<IMigrationTarget::migrateUserEpochWeightsCall>()
        }
        StreamKind::Epochs => schema.require_function::<IMigrationTarget::migrateEpochDataCall>(),
    }
}

/// One encoded destination call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBatch {
    /// Entities covered.
    pub range: BatchRange,
    /// ABI-encoded call.
    pub calldata: Bytes,
    /// Length of every parallel array in the call, by parameter name.
    pub arrays: Vec<(&'static str, usize)>,
}

impl EncodedBatch {
    /// Verifies that every parallel array holds exactly `range.len()` elements.
    pub fn check_lengths(&self, stream: StreamKind) -> Result<(), ReplayError> {
        let expected = self.range.len();
        match self.arrays.iter().find(|(_, len)| *len != expected) {
            Some(&(array, len)) => {
                Err(ReplayError::LengthMismatch { stream, range: self.range, array, len, expected })
            }
            None => Ok(()),
        }
    }
}

/// Turns a snapshot collection into an ordered sequence of destination calls.
pub trait MigrationStream: Send + Sync {
    /// Which stream this is.
    fn kind(&self) -> StreamKind;

    /// Number of entities the stream migrates.
    fn entity_count(&self) -> usize;

    /// Encodes the call for `range`.
    fn encode(&self, range: BatchRange) -> EncodedBatch;
}

/// Returns the stream of kind `kind` over `snapshot`.
pub fn stream_for(kind: StreamKind, snapshot: &Snapshot) -> Box<dyn MigrationStream + '_> {
    match kind {
        StreamKind::Channels => Box::new(ChannelStream(snapshot)),
        StreamKind::Delegates => Box::new(DelegateStream(snapshot)),
        StreamKind::Stakers => Box::new(StakerStream(snapshot)),
        StreamKind::EpochWeights => Box::new(EpochWeightStream(snapshot)),
        StreamKind::Epochs => Box::new(EpochStream(snapshot)),
    }
}

fn window<T>(items: &[T], range: BatchRange) -> &[T] {
    items.get(range.indices()).unwrap_or_default()
}

fn bounds(range: BatchRange) -> (U256, U256) {
    (U256::from(range.start), U256::from(range.end))
}

#[derive(Debug)]
struct ChannelStream<'a>(&'a Snapshot);

impl MigrationStream for ChannelStream<'_> {
    fn kind(&self) -> StreamKind {
        StreamKind::Channels
    }

    fn entity_count(&self) -> usize {
        self.0.channels.len()
    }

    fn encode(&self, range: BatchRange) -> EncodedBatch {
        let channels = window(&self.0.channels, range);
        let (start, end) = bounds(range);
        let call = IMigrationTarget::migrateChannelDataCall {
            startIndex: start,
            endIndex: end,
            channelAddresses: channels.iter().map(|c| c.key).collect(),
            channelTypes: channels.iter().map(|c| c.channel_type.code()).collect(),
            identities: channels.iter().map(|c| c.identity.clone()).collect(),
            amounts: channels.iter().map(|c| c.pool_contribution).collect(),
            channelExpiryTimes: channels.iter().map(|c| c.expiry_time).collect(),
        };
        EncodedBatch {
            range,
            arrays: vec![
                ("channelAddresses", call.channelAddresses.len()),
                ("channelTypes", call.channelTypes.len()),
                ("identities", call.identities.len()),
                ("amounts", call.amounts.len()),
                ("channelExpiryTimes", call.channelExpiryTimes.len()),
            ],
            calldata: call.abi_encode().into(),
        }
    }
}

#[derive(Debug)]
struct DelegateStream<'a>(&'a Snapshot);

impl MigrationStream for DelegateStream<'_> {
    fn kind(&self) -> StreamKind {
        StreamKind::Delegates
    }

    fn entity_count(&self) -> usize {
        self.0.delegates.len()
    }

    fn encode(&self, range: BatchRange) -> EncodedBatch {
        let delegates = window(&self.0.delegates, range);
        let (start, end) = bounds(range);
        let call = IMigrationTarget::migrateDelegateDataCall {
            startIndex: start,
            endIndex: end,
            channels: delegates.iter().map(|d| d.channel).collect(),
            delegates: delegates.iter().map(|d| d.delegate).collect(),
        };
        EncodedBatch {
            range,
            arrays: vec![("channels", call.channels.len()), ("delegates", call.delegates.len())],
            calldata: call.abi_encode().into(),
        }
    }
}

#[derive(Debug)]
struct StakerStream<'a>(&'a Snapshot);

impl MigrationStream for StakerStream<'_> {
    fn kind(&self) -> StreamKind {
        StreamKind::Stakers
    }

    fn entity_count(&self) -> usize {
        self.0.stakers.len()
    }

    fn encode(&self, range: BatchRange) -> EncodedBatch {
        let stakers = window(&self.0.stakers, range);
        let (start, end) = bounds(range);
        let call = IMigrationTarget::migrateStakerDataCall {
            startIndex: start,
            endIndex: end,
            users: stakers.iter().map(|s| s.key).collect(),
            stakedAmounts: stakers.iter().map(|s| s.staked_amount).collect(),
            stakedWeights: stakers.iter().map(|s| s.staked_weight).collect(),
            lastStakedBlocks: stakers.iter().map(|s| s.last_staked_block).collect(),
            lastClaimedBlocks: stakers.iter().map(|s| s.last_claimed_block).collect(),
            rewardsClaimed: stakers.iter().map(|s| s.rewards_claimed).collect(),
        };
        EncodedBatch {
            range,
            arrays: vec![
                ("users", call.users.len()),
                ("stakedAmounts", call.stakedAmounts.len()),
                ("stakedWeights", call.stakedWeights.len()),
                ("lastStakedBlocks", call.lastStakedBlocks.len()),
                ("lastClaimedBlocks", call.lastClaimedBlocks.len()),
                ("rewardsClaimed", call.rewardsClaimed.len()),
            ],
            calldata: call.abi_encode().into(),
        }
    }
}

/// Per-user epoch weights, in staker order.
#[derive(Debug)]
struct EpochWeightStream<'a>(&'a Snapshot);

impl MigrationStream for EpochWeightStream<'_> {
    fn kind(&self) -> StreamKind {
        StreamKind::EpochWeights
    }

    fn entity_count(&self) -> usize {
        self.0.stakers.len()
    }

    fn encode(&self, range: BatchRange) -> EncodedBatch {
        let stakers = window(&self.0.stakers, range);
        let (start, end) = bounds(range);
        // A staker without a weight row shortens `epochWeights` and fails the length check.
        let call = IMigrationTarget::migrateUserEpochWeightsCall {
            startIndex: start,
            endIndex: end,
            users: stakers.iter().map(|s| s.key).collect(),
            epochWeights: stakers
                .iter()
                .filter_map(|s| self.0.staker_epoch_weights(&s.key))
                .map(<[U256]>::to_vec)
                .collect(),
        };
        EncodedBatch {
            range,
            arrays: vec![("users", call.users.len()), ("epochWeights", call.epochWeights.len())],
            calldata: call.abi_encode().into(),
        }
    }
}

/// Global aggregates. Index `i` is epoch `i + 1`.
#[derive(Debug)]
struct EpochStream<'a>(&'a Snapshot);

impl MigrationStream for EpochStream<'_> {
    fn kind(&self) -> StreamKind {
        StreamKind::Epochs
    }

    fn entity_count(&self) -> usize {
        self.0.epoch_count as usize
    }

    fn encode(&self, range: BatchRange) -> EncodedBatch {
        let (start, end) = bounds(range);
        let call = IMigrationTarget::migrateEpochDataCall {
            startIndex: start,
            endIndex: end,
            epochRewards: window(&self.0.epoch_rewards, range).to_vec(),
            epochToTotalStakedWeight: window(&self.0.epoch_to_total_staked_weight, range).to_vec(),
        };
        EncodedBatch {
            range,
            arrays: vec![
                ("epochRewards", call.epochRewards.len()),
                ("epochToTotalStakedWeight", call.epochToTotalStakedWeight.len()),
            ],
            calldata: call.abi_encode().into(),
        }
    }
}
