//! Storage slot derivation for values without a public getter.

use alloy::primitives::{Address, B256, U256, keccak256};

/// Solidity storage slot of `mapping[key]` for a mapping declared at `slot`.
pub fn mapping_slot(key: B256, slot: U256) -> U256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(key.as_slice());
    preimage[32..].copy_from_slice(&slot.to_be_bytes::<32>());
    U256::from_be_bytes(keccak256(preimage).0)
}

/// Storage layout of the staking bookkeeping in the source contract.
///
/// `userFeesInfo` is a `mapping(address => struct)` whose value holds a nested
/// `mapping(uint256 => uint256) epochToUserStakedWeight` at `epoch_weight_offset` words from
/// the struct's base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StakingLayout {
    /// Declaration slot of `userFeesInfo`.
    pub user_fees_info_slot: U256,
    /// Word offset of `epochToUserStakedWeight` inside the struct.
    pub epoch_weight_offset: U256,
}

impl StakingLayout {
    /// Creates a layout from its two slot numbers.
    pub fn new(user_fees_info_slot: u64, epoch_weight_offset: u64) -> Self {
        Self {
            user_fees_info_slot: U256::from(user_fees_info_slot),
            epoch_weight_offset: U256::from(epoch_weight_offset),
        }
    }

    /// Slot holding `user`'s staked weight for `epoch`.
    pub fn user_epoch_weight_slot(&self, user: Address, epoch: u64) -> U256 {
        let base = mapping_slot(user.into_word(), self.user_fees_info_slot);
        let nested = base.wrapping_add(self.epoch_weight_offset);
        mapping_slot(B256::from(U256::from(epoch)), nested)
    }
}
