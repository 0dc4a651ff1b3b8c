//! Folded per-key event state.

use std::hash::Hash;

use shuttle_primitives::{EntityKey, sort_dedup};

/// The latest event observed for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replayed<K, P> {
    /// Key the events were folded under.
    pub key: K,
    /// Payload of the latest event.
    pub payload: P,
    /// Block of the latest event.
    pub block_number: u64,
    /// Log index of the latest event.
    pub log_index: u64,
    /// Number of logs seen for the key.
    pub occurrences: u64,
    /// Position of the first log seen for the key.
    pub first_seen: (u64, u64),
}

impl<K, P> Replayed<K, P> {
    pub(crate) const fn first(key: K, payload: P, position: (u64, u64)) -> Self {
        Self {
            key,
            payload,
            block_number: position.0,
            log_index: position.1,
            occurrences: 1,
            first_seen: position,
        }
    }

    pub(crate) fn observe(&mut self, payload: P, position: (u64, u64)) {
        self.occurrences += 1;
        if position > self.position() {
            self.payload = payload;
            (self.block_number, self.log_index) = position;
        }
        self.first_seen = self.first_seen.min(position);
    }

    /// Position of the latest event.
    pub const fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }

    /// Maps the payload, keeping key and positions.
    pub fn map<Q>(self, f: impl FnOnce(P) -> Q) -> Replayed<K, Q> {
        Replayed {
            key: self.key,
            payload: f(self.payload),
            block_number: self.block_number,
            log_index: self.log_index,
            occurrences: self.occurrences,
            first_seen: self.first_seen,
        }
    }
}

/// Merges two replays over the same key space with the latest-wins rule.
///
/// Occurrences add up; output keys are in first-discovery order across both inputs.
pub fn merge_latest<K, P>(a: Vec<Replayed<K, P>>, b: Vec<Replayed<K, P>>) -> Vec<Replayed<K, P>>
where
    K: Clone + Eq + Hash,
{
    let mut merged: Vec<Replayed<K, P>> = Vec::with_capacity(a.len() + b.len());
    let mut index = std::collections::HashMap::new();

    for entry in a.into_iter().chain(b) {
        match index.get(&entry.key) {
            Some(&i) => {
                let existing: &mut Replayed<K, P> = &mut merged[i];
                existing.occurrences += entry.occurrences;
                existing.first_seen = existing.first_seen.min(entry.first_seen);
                if entry.position() > existing.position() {
                    existing.block_number = entry.block_number;
                    existing.log_index = entry.log_index;
                    existing.payload = entry.payload;
                }
            }
            None => {
                index.insert(entry.key.clone(), merged.len());
                merged.push(entry);
            }
        }
    }

    merged.sort_by_key(|r| r.first_seen);
    merged
}

/// Collects the keys of several replays, ascending and without duplicates.
pub fn distinct_keys<'a, P: 'a>(
    replays: impl IntoIterator<Item = &'a [Replayed<EntityKey, P>]>,
) -> Vec<EntityKey> {
    sort_dedup(replays.into_iter().flat_map(|r| r.iter().map(|e| e.key)).collect())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::Address;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Delegation {
        Added,
        Removed,
    }

    fn pair(c: u8, d: u8) -> (Address, Address) {
        (Address::repeat_byte(c), Address::repeat_byte(d))
    }

    #[test]
    fn later_removal_wins_over_earlier_addition() {
        let added = vec![Replayed::first(pair(1, 2), Delegation::Added, (10, 0))];
        let removed = vec![Replayed::first(pair(1, 2), Delegation::Removed, (12, 3))];
        let merged = merge_latest(added, removed);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].payload, Delegation::Removed);
        assert_eq!(merged[0].occurrences, 2);
        assert_eq!(merged[0].first_seen, (10, 0));
    }

    #[test]
    fn re_addition_after_removal_wins() {
        let mut added = Replayed::first(pair(1, 2), Delegation::Added, (10, 0));
        added.observe(Delegation::Added, (20, 0));
        let removed = vec![Replayed::first(pair(1, 2), Delegation::Removed, (15, 0))];
        let merged = merge_latest(vec![added], removed);
        assert_eq!(merged[0].payload, Delegation::Added);
        assert_eq!(merged[0].position(), (20, 0));
        assert_eq!(merged[0].occurrences, 3);
    }

    #[test]
    fn merged_keys_follow_first_discovery() {
        let a = vec![
            Replayed::first(pair(1, 1), Delegation::Added, (5, 0)),
            Replayed::first(pair(3, 3), Delegation::Added, (9, 0)),
        ];
        let b = vec![Replayed::first(pair(2, 2), Delegation::Removed, (7, 1))];
        let keys: Vec<_> = merge_latest(a, b).into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec![pair(1, 1), pair(2, 2), pair(3, 3)]);
    }

    #[test]
    fn distinct_keys_are_sorted_and_unique() {
        let staked = vec![
            Replayed::first(Address::repeat_byte(9), (), (1, 0)),
            Replayed::first(Address::repeat_byte(3), (), (2, 0)),
        ];
        let harvested = vec![Replayed::first(Address::repeat_byte(3), (), (4, 0))];
        let keys = distinct_keys([staked.as_slice(), harvested.as_slice()]);
        assert_eq!(keys, vec![Address::repeat_byte(3), Address::repeat_byte(9)]);
    }

    #[test]
    fn map_keeps_positions() {
        let r = Replayed::first(1u8, "x", (3, 4)).map(str::len);
        assert_eq!(r.payload, 1);
        assert_eq!(r.position(), (3, 4));
    }
}
