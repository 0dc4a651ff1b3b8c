//! Plain data carried across the chain capability traits.

use alloy::{
    primitives::{Address, B256, Bytes},
    sol_types::SolEvent,
};

use crate::ChainError;

/// A log query over an inclusive block range for a single event signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    /// Emitting contract.
    pub address: Address,
    /// Event signature hash (`topic0`).
    pub topic0: B256,
    /// First block, inclusive.
    pub from_block: u64,
    /// Last block, inclusive.
    pub to_block: u64,
}

impl LogQuery {
    /// Builds a query for event `E` emitted by `address` in `[from_block, to_block]`.
    pub const fn for_event<E: SolEvent>(address: Address, from_block: u64, to_block: u64) -> Self {
        Self { address, topic0: E::SIGNATURE_HASH, from_block, to_block }
    }
}

/// A mined log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics, `topic0` first.
    pub topics: Vec<B256>,
    /// ABI encoded non-indexed data.
    pub data: Bytes,
    /// Block the log was mined in.
    pub block_number: u64,
    /// Index of the log within its block.
    pub log_index: u64,
    /// Transaction that emitted the log.
    pub transaction_hash: B256,
}

impl RawLog {
    /// Chain position of the log. Orders logs by emission.
    pub const fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }

    /// Decodes the log as event `E`.
    pub fn decode<E: SolEvent>(&self) -> Result<E, ChainError> {
        E::decode_raw_log(self.topics.iter().copied(), &self.data)
            .map_err(|e| ChainError::Decode(format!("{} at {:?}: {e}", E::SIGNATURE, self.position())))
    }
}

/// Optional gas overrides for a submission. Unset fields are filled by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasParams {
    /// Gas limit.
    pub gas_limit: Option<u64>,
    /// EIP-1559 max fee per gas, in wei.
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 priority fee per gas, in wei.
    pub max_priority_fee_per_gas: Option<u128>,
}

/// A submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxHandle {
    /// Transaction hash.
    pub hash: B256,
    /// Nonce the transaction was sent with.
    pub nonce: u64,
    /// Call target.
    pub to: Address,
    /// Calldata, kept so a revert can be re-simulated for its reason.
    pub calldata: Bytes,
}

/// A confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash.
    pub tx_hash: B256,
    /// Inclusion block.
    pub block_number: u64,
    /// Gas consumed.
    pub gas_used: u64,
}
