//! Entity keys.

use alloy::primitives::Address;

/// Identifier of a channel or staking participant.
///
/// Hex input is parsed case-insensitively, so two keys are equal exactly when their 20 bytes
/// are equal. Ordering is byte order.
pub type EntityKey = Address;

/// Sorts keys ascending and removes adjacent duplicates.
pub fn sort_dedup(mut keys: Vec<EntityKey>) -> Vec<EntityKey> {
    keys.sort_unstable();
    keys.dedup();
    keys
}

/// Returns every key that appears more than once, each reported once, ascending.
pub fn duplicate_keys(keys: impl IntoIterator<Item = EntityKey>) -> Vec<EntityKey> {
    let mut sorted: Vec<_> = keys.into_iter().collect();
    sorted.sort_unstable();

    let mut duplicates = Vec::new();
    for pair in sorted.windows(2) {
        if pair[0] == pair[1] && duplicates.last() != Some(&pair[0]) {
            duplicates.push(pair[0]);
        }
    }
    duplicates
}
