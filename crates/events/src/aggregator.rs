//! Windowed log replay.

use std::{
    collections::{BTreeSet, HashMap},
    hash::Hash,
};

use alloy::{
    primitives::{Address, B256},
    sol_types::SolEvent,
};
use shuttle_chain::{ChainError, ChainReader, LogQuery, RawLog, retry};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{AggregateError, EventAggregatorConfig, Replayed};

/// Replays contract events over a block range and folds them per key.
#[derive(Debug)]
pub struct EventAggregator<R> {
    reader: R,
    config: EventAggregatorConfig,
    cancel: CancellationToken,
}

impl<R: ChainReader> EventAggregator<R> {
    /// Creates a new aggregator.
    pub const fn new(reader: R, config: EventAggregatorConfig, cancel: CancellationToken) -> Self {
        Self { reader, config, cancel }
    }

    /// Returns the aggregator configuration.
    pub const fn config(&self) -> &EventAggregatorConfig {
        &self.config
    }

    /// Inclusive windows covering `[from_block, to_block]`.
    pub fn windows(&self, to_block: u64) -> Result<Vec<(u64, u64)>, AggregateError> {
        let EventAggregatorConfig { from_block, window_size, overlap, .. } = self.config;
        if window_size == 0 || overlap >= window_size {
            return Err(AggregateError::InvalidWindow { window_size, overlap });
        }

        let mut windows = Vec::new();
        if from_block > to_block {
            return Ok(windows);
        }
        let mut start = from_block;
        loop {
            let end = start.saturating_add(window_size - 1).min(to_block);
            windows.push((start, end));
            if end == to_block {
                return Ok(windows);
            }
            start = end + 1 - overlap;
        }
    }

    /// Fetches every `topic0` log emitted by `address` up to `to_block`.
    ///
    /// The result is in chain order with `(block_number, log_index)` duplicates removed.
    pub async fn fetch_logs(
        &self,
        address: Address,
        topic0: B256,
        to_block: u64,
    ) -> Result<Vec<RawLog>, AggregateError> {
        let windows = self.windows(to_block)?;
        let mut all = Vec::new();
        let mut previous: Option<((u64, u64), Vec<RawLog>)> = None;

        for (from, to) in windows {
            if self.cancel.is_cancelled() {
                return Err(AggregateError::Cancelled);
            }
            let query = LogQuery { address, topic0, from_block: from, to_block: to };
            let logs = retry(&self.config.retry, "get_logs", &self.cancel, || {
                self.reader.get_logs(&query)
            })
            .await
            .map_err(|source| match source {
                ChainError::Cancelled => AggregateError::Cancelled,
                source => AggregateError::Query { from_block: from, to_block: to, source },
            })?;
            trace!(from, to, count = logs.len(), %topic0, "Fetched log window");

            if let Some((prev_window, prev_logs)) = &previous {
                check_overlap(*prev_window, prev_logs, (from, to), &logs)?;
            }
            all.extend(logs.iter().cloned());
            previous = Some(((from, to), logs));
        }

        all.sort_by_key(RawLog::position);
        all.dedup_by_key(|log| log.position());
        debug!(%address, %topic0, to_block, count = all.len(), "Fetched event history");
        Ok(all)
    }

    /// Replays event `E` up to `to_block`, keeping the latest payload per key.
    ///
    /// Keys come back in first-discovery order.
    pub async fn replay<E, K, F>(
        &self,
        address: Address,
        to_block: u64,
        key_fn: F,
    ) -> Result<Vec<Replayed<K, E>>, AggregateError>
    where
        E: SolEvent,
        K: Clone + Eq + Hash,
        F: Fn(&E) -> K,
    {
        let logs = self.fetch_logs(address, E::SIGNATURE_HASH, to_block).await?;
        fold_latest(&logs, key_fn)
    }
}

/// Folds decoded logs into one latest-wins entry per key.
pub fn fold_latest<E, K, F>(logs: &[RawLog], key_fn: F) -> Result<Vec<Replayed<K, E>>, AggregateError>
where
    E: SolEvent,
    K: Clone + Eq + Hash,
    F: Fn(&E) -> K,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<Replayed<K, E>> = Vec::new();

    for log in logs {
        let event = E::decode_raw_log(log.topics.iter().copied(), &log.data).map_err(|e| {
            AggregateError::Decode {
                event: E::SIGNATURE,
                block_number: log.block_number,
                log_index: log.log_index,
                reason: e.to_string(),
            }
        })?;
        let key = key_fn(&event);
        match index.get(&key) {
            Some(&i) => out[i].observe(event, log.position()),
            None => {
                index.insert(key.clone(), out.len());
                out.push(Replayed::first(key, event, log.position()));
            }
        }
    }
    Ok(out)
}

fn check_overlap(
    previous: (u64, u64),
    previous_logs: &[RawLog],
    current: (u64, u64),
    current_logs: &[RawLog],
) -> Result<(), AggregateError> {
    let (shared_from, shared_to) = (current.0, previous.1);
    if shared_from > shared_to {
        return Ok(());
    }
    let in_shared = |logs: &[RawLog]| -> BTreeSet<(u64, u64, B256)> {
        logs.iter()
            .filter(|log| (shared_from..=shared_to).contains(&log.block_number))
            .map(|log| (log.block_number, log.log_index, log.transaction_hash))
            .collect()
    };
    if in_shared(previous_logs) == in_shared(current_logs) {
        Ok(())
    } else {
        Err(AggregateError::InconsistentWindow { previous, current })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use alloy::primitives::{Bytes, U256};
    use rstest::rstest;
    use shuttle_chain::{MockChain, RetryPolicy, contracts::ICoreSource};

    use super::*;

    const CORE: Address = Address::repeat_byte(0xcc);

    fn config(window_size: u64, overlap: u64) -> EventAggregatorConfig {
        EventAggregatorConfig::builder()
            .window_size(window_size)
            .overlap(overlap)
            .retry(
                RetryPolicy::default()
                    .with_max_attempts(3)
                    .with_initial_backoff(Duration::from_millis(1)),
            )
            .build()
    }

    fn update(channel: u8, identity: &'static [u8]) -> ICoreSource::UpdateChannel {
        ICoreSource::UpdateChannel {
            channel: Address::repeat_byte(channel),
            identity: Bytes::from_static(identity),
        }
    }

    fn seeded_chain() -> MockChain {
        let chain = MockChain::new();
        chain.emit(CORE, &update(2, b"b-1"), 3, 0);
        chain.emit(CORE, &update(1, b"a-1"), 5, 0);
        chain.emit(CORE, &update(1, b"a-2"), 5, 1);
        chain.emit(CORE, &update(2, b"b-2"), 9, 4);
        chain.emit(CORE, &update(3, b"c-1"), 12, 0);
        chain.emit(CORE, &update(1, b"a-3"), 17, 2);
        chain
    }

    async fn replay_updates(
        chain: MockChain,
        config: EventAggregatorConfig,
    ) -> Vec<Replayed<Address, ICoreSource::UpdateChannel>> {
        let aggregator = EventAggregator::new(chain, config, CancellationToken::new());
        aggregator
            .replay::<ICoreSource::UpdateChannel, _, _>(CORE, 20, |e| e.channel)
            .await
            .unwrap()
    }

    #[rstest]
    #[case(1, 0)]
    #[case(3, 1)]
    #[case(7, 2)]
    #[case(10, 9)]
    #[case(1_000, 10)]
    #[tokio::test]
    async fn output_is_independent_of_window_size(#[case] window_size: u64, #[case] overlap: u64) {
        let replayed = replay_updates(seeded_chain(), config(window_size, overlap)).await;

        let keys: Vec<_> = replayed.iter().map(|r| r.key).collect();
        assert_eq!(
            keys,
            vec![Address::repeat_byte(2), Address::repeat_byte(1), Address::repeat_byte(3)]
        );
        let a = &replayed[1];
        assert_eq!(a.payload.identity, Bytes::from_static(b"a-3"));
        assert_eq!(a.position(), (17, 2));
        assert_eq!(a.occurrences, 3);
        assert_eq!(a.first_seen, (5, 0));
        assert_eq!(replayed[0].payload.identity, Bytes::from_static(b"b-2"));
    }

    #[tokio::test]
    async fn same_block_tie_breaks_on_log_index() {
        let chain = MockChain::new();
        chain.emit(CORE, &update(1, b"late"), 8, 7);
        chain.emit(CORE, &update(1, b"early"), 8, 2);
        let replayed = replay_updates(chain, config(100, 0)).await;
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].payload.identity, Bytes::from_static(b"late"));
    }

    #[tokio::test]
    async fn overlap_mismatch_fails_the_replay() {
        let chain = seeded_chain();
        // Window 0 is 0..=9 and shares 8..=9 with window 1; drop its block 9 log.
        chain.truncate_log_query(0);
        let aggregator = EventAggregator::new(chain, config(10, 2), CancellationToken::new());
        let err = aggregator
            .replay::<ICoreSource::UpdateChannel, _, _>(CORE, 20, |e| e.channel)
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::InconsistentWindow { previous: (0, 9), current: (8, 17) });
    }

    #[tokio::test]
    async fn transient_query_failures_are_retried() {
        let chain = seeded_chain();
        chain.fail_next_reads([ChainError::Timeout, ChainError::RateLimited("slow".to_string())]);
        let replayed = replay_updates(chain.clone(), config(1_000, 0)).await;
        assert_eq!(replayed.len(), 3);
        assert_eq!(chain.log_queries(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_name_the_window() {
        let chain = seeded_chain();
        chain.fail_next_reads(vec![ChainError::Timeout; 3]);
        let aggregator = EventAggregator::new(chain, config(1_000, 0), CancellationToken::new());
        let err = aggregator
            .fetch_logs(CORE, ICoreSource::UpdateChannel::SIGNATURE_HASH, 20)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AggregateError::Query { from_block: 0, to_block: 20, source: ChainError::Timeout }
        );
    }

    #[tokio::test]
    async fn undecodable_log_reports_its_position() {
        let chain = MockChain::new();
        // Staked and UpdateChannel differ in layout; forge an UpdateChannel topic over Staked data.
        chain.emit(
            CORE,
            &ICoreSource::Staked { user: Address::repeat_byte(1), amountStaked: U256::from(1u64) },
            4,
            1,
        );
        let mut logs = chain
            .get_logs(&LogQuery::for_event::<ICoreSource::Staked>(CORE, 0, 10))
            .await
            .unwrap();
        logs[0].topics[0] = ICoreSource::UpdateChannel::SIGNATURE_HASH;
        let err = fold_latest::<ICoreSource::UpdateChannel, _, _>(&logs, |e| e.channel).unwrap_err();
        assert!(matches!(err, AggregateError::Decode { block_number: 4, log_index: 1, .. }));
    }

    #[tokio::test]
    async fn cancelled_replay_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let aggregator = EventAggregator::new(seeded_chain(), config(5, 0), cancel);
        let err = aggregator
            .fetch_logs(CORE, ICoreSource::UpdateChannel::SIGNATURE_HASH, 20)
            .await
            .unwrap_err();
        assert_eq!(err, AggregateError::Cancelled);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(10, 10)]
    #[case(10, 11)]
    fn invalid_windows_are_rejected(#[case] window_size: u64, #[case] overlap: u64) {
        let aggregator =
            EventAggregator::new(MockChain::new(), config(window_size, overlap), CancellationToken::new());
        assert_eq!(
            aggregator.windows(100),
            Err(AggregateError::InvalidWindow { window_size, overlap })
        );
    }

    #[test]
    fn windows_cover_the_range_with_overlap() {
        let aggregator = EventAggregator::new(
            MockChain::new(),
            EventAggregatorConfig::builder().from_block(10).window_size(10).overlap(2).build(),
            CancellationToken::new(),
        );
        assert_eq!(aggregator.windows(30).unwrap(), vec![(10, 19), (18, 27), (26, 30)]);
        assert_eq!(aggregator.windows(5).unwrap(), vec![]);
        assert_eq!(aggregator.windows(10).unwrap(), vec![(10, 10)]);
    }
}
