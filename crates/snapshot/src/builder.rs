//! Snapshot construction from event history and live state.

use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
    future::Future,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::primitives::U256;
use futures::{StreamExt, TryStreamExt, stream};
use shuttle_chain::{
    AbiError, AbiSchema, ChainError, ChainReader, call_view, contracts::ICoreSource, retry,
};
use shuttle_events::{EventAggregator, Replayed, distinct_keys, merge_latest};
use shuttle_primitives::{
    ChannelRecord, ChannelState, ChannelType, DelegateRecord, EntityKey, Snapshot, StakerRecord,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{SnapshotConfig, SnapshotError};

/// Latest delegation event for a `(channel, delegate)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delegation {
    Added,
    Removed,
}

type EpochWeights = BTreeMap<EntityKey, Vec<U256>>;

/// Builds a [`Snapshot`] of the source core contract.
///
/// Event history only nominates keys. Every captured field comes from a live read made at
/// the pinned source block.
#[derive(Debug)]
pub struct SnapshotBuilder<R> {
    reader: R,
    config: SnapshotConfig,
    cancel: CancellationToken,
}

impl<R: ChainReader> SnapshotBuilder<R> {
    /// Creates a new builder.
    pub const fn new(reader: R, config: SnapshotConfig, cancel: CancellationToken) -> Self {
        Self { reader, config, cancel }
    }

    /// Returns the builder configuration.
    pub const fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Builds the snapshot.
    pub async fn build(&self) -> Result<Snapshot, SnapshotError> {
        let head = self.with_retry("block number", "head", || self.reader.block_number()).await?;
        let source_block = head.saturating_sub(self.config.confirmation_lag);
        info!(head, source_block, core = %self.config.core, epochs = self.config.epochs, "Building snapshot");

        let mut snapshot =
            Snapshot::empty(self.config.label.clone(), source_block, self.config.epochs);
        snapshot.created_at =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();

        snapshot.channels = self.channels(source_block).await?;
        snapshot.delegates = self.delegates(source_block, &snapshot.channels).await?;
        let (stakers, weights) = self.stakers(source_block).await?;
        snapshot.stakers = stakers;
        snapshot.per_epoch_staked_weight = weights;
        let (rewards, totals) = self.epochs(source_block).await?;
        snapshot.epoch_rewards = rewards;
        snapshot.epoch_to_total_staked_weight = totals;

        info!(
            source_block,
            channels = snapshot.channels.len(),
            delegates = snapshot.delegates.len(),
            stakers = snapshot.stakers.len(),
            "Snapshot built"
        );
        Ok(snapshot)
    }

    fn aggregator(&self) -> EventAggregator<&R> {
        EventAggregator::new(&self.reader, self.config.events.clone(), self.cancel.clone())
    }

    async fn with_retry<T, F, Fut>(
        &self,
        what: &'static str,
        key: impl Display,
        op: F,
    ) -> Result<T, SnapshotError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        retry(&self.config.retry, what, &self.cancel, op)
            .await
            .map_err(|e| SnapshotError::read(what, key, e))
    }

    /// Runs `f` over `items` with at most `fan_out` in flight, keeping input order.
    async fn fan_out<I, T, F, Fut>(&self, items: I, f: F) -> Result<Vec<T>, SnapshotError>
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> Fut,
        Fut: Future<Output = Result<T, SnapshotError>>,
    {
        stream::iter(items).map(f).buffered(self.config.fan_out.max(1)).try_collect().await
    }

    async fn channels(&self, block: u64) -> Result<Vec<ChannelRecord>, SnapshotError> {
        let core = self.config.core;
        let events = self.aggregator();
        let added =
            events.replay::<ICoreSource::AddChannel, _, _>(core, block, |e| e.channel).await?;
        let updated: HashMap<EntityKey, Replayed<EntityKey, ICoreSource::UpdateChannel>> = events
            .replay::<ICoreSource::UpdateChannel, _, _>(core, block, |e| e.channel)
            .await?
            .into_iter()
            .map(|r| (r.key, r))
            .collect();

        let live = self
            .fan_out(added.iter().map(|r| r.key), |key| async move {
                let call = ICoreSource::channelsCall { channel: key };
                self.with_retry("channels", key, || call_view(&self.reader, core, &call, block))
                    .await
            })
            .await?;

        let mut channels = Vec::with_capacity(added.len());
        let mut inactive = 0usize;
        for (add, info) in added.iter().zip(live) {
            let key = add.key;
            let state = ChannelState::try_from(info.channelState).map_err(|e| inconsistent(key, e))?;
            if !state.is_active() {
                debug!(%key, ?state, "Skipping inactive channel");
                inactive += 1;
                continue;
            }
            let channel_type =
                ChannelType::try_from(info.channelType).map_err(|e| inconsistent(key, e))?;

            let update = updated.get(&key);
            let identity = match update {
                Some(u) if u.position() > add.position() => u.payload.identity.clone(),
                _ => add.payload.identity.clone(),
            };
            channels.push(ChannelRecord {
                key,
                channel_type,
                identity,
                pool_contribution: info.poolContribution,
                expiry_time: info.expiryTime,
                update_counter: update.map_or(0, |u| u.occurrences),
            });
        }
        channels.sort_by_key(|c| c.key);

        info!(discovered = added.len(), active = channels.len(), inactive, "Captured channels");
        Ok(channels)
    }

    async fn delegates(
        &self,
        block: u64,
        channels: &[ChannelRecord],
    ) -> Result<Vec<DelegateRecord>, SnapshotError> {
        let core = self.config.core;
        let events = self.aggregator();
        let added = events
            .replay::<ICoreSource::AddDelegate, _, _>(core, block, |e| (e.channel, e.delegate))
            .await?
            .into_iter()
            .map(|r| r.map(|_| Delegation::Added))
            .collect();
        let removed = events
            .replay::<ICoreSource::RemoveDelegate, _, _>(core, block, |e| (e.channel, e.delegate))
            .await?
            .into_iter()
            .map(|r| r.map(|_| Delegation::Removed))
            .collect();
        let candidates = merge_latest(added, removed);

        let live = self
            .fan_out(candidates.iter().map(|r| r.key), |(channel, delegate)| async move {
                let call = ICoreSource::delegatedNotificationSendersCall { channel, delegate };
                self.with_retry("delegatedNotificationSenders", format!("{channel}/{delegate}"), || {
                    call_view(&self.reader, core, &call, block)
                })
                .await
            })
            .await?;

        let mut delegates = Vec::new();
        for (candidate, active) in candidates.iter().zip(live) {
            let (channel, delegate) = candidate.key;
            if active != (candidate.payload == Delegation::Added) {
                debug!(%channel, %delegate, active, latest = ?candidate.payload, "Live delegation differs from event history");
            }
            if active {
                delegates.push(DelegateRecord { channel, delegate, active });
            }
        }
        delegates.sort();

        for d in &delegates {
            if channels.binary_search_by(|c| c.key.cmp(&d.channel)).is_err() {
                warn!(channel = %d.channel, delegate = %d.delegate, "Delegate's channel is not in the snapshot");
            }
        }
        info!(candidates = candidates.len(), active = delegates.len(), "Captured delegates");
        Ok(delegates)
    }

    async fn stakers(&self, block: u64) -> Result<(Vec<StakerRecord>, EpochWeights), SnapshotError> {
        let core = self.config.core;
        let events = self.aggregator();
        let staked: Vec<Replayed<EntityKey, ()>> = events
            .replay::<ICoreSource::Staked, _, _>(core, block, |e| e.user)
            .await?
            .into_iter()
            .map(|r| r.map(|_| ()))
            .collect();
        let unstaked: Vec<Replayed<EntityKey, ()>> = events
            .replay::<ICoreSource::Unstaked, _, _>(core, block, |e| e.user)
            .await?
            .into_iter()
            .map(|r| r.map(|_| ()))
            .collect();
        let harvested: Vec<Replayed<EntityKey, ()>> = events
            .replay::<ICoreSource::RewardsHarvested, _, _>(core, block, |e| e.user)
            .await?
            .into_iter()
            .map(|r| r.map(|_| ()))
            .collect();
        let keys = distinct_keys([staked.as_slice(), unstaked.as_slice(), harvested.as_slice()]);

        let positions = self.fan_out(keys.iter().copied(), |key| self.staker(key, block)).await?;

        let mut stakers = Vec::with_capacity(positions.len());
        let mut weights = BTreeMap::new();
        let mut empty = 0usize;
        for (record, epoch_weights) in positions {
            if record.is_empty() && epoch_weights.iter().all(U256::is_zero) {
                empty += 1;
                continue;
            }
            weights.insert(record.key, epoch_weights);
            stakers.push(record);
        }

        info!(discovered = keys.len(), captured = stakers.len(), empty, "Captured stakers");
        Ok((stakers, weights))
    }

    async fn staker(
        &self,
        key: EntityKey,
        block: u64,
    ) -> Result<(StakerRecord, Vec<U256>), SnapshotError> {
        let core = self.config.core;
        let fees_call = ICoreSource::userFeesInfoCall { user: key };
        let fees = self
            .with_retry("userFeesInfo", key, || call_view(&self.reader, core, &fees_call, block))
            .await?;
        let claimed_call = ICoreSource::usersRewardsClaimedCall { user: key };
        let rewards_claimed = self
            .with_retry("usersRewardsClaimed", key, || {
                call_view(&self.reader, core, &claimed_call, block)
            })
            .await?;

        let mut weights = Vec::with_capacity(self.config.epochs as usize);
        for epoch in 1..=self.config.epochs {
            let slot = self.config.layout.user_epoch_weight_slot(key, epoch);
            let weight = self
                .with_retry("epoch weight", key, || self.reader.get_storage_at(core, slot, block))
                .await?;
            weights.push(weight);
        }

        let record = StakerRecord {
            key,
            staked_amount: fees.stakedAmount,
            staked_weight: fees.stakedWeight,
            last_staked_block: fees.lastStakedBlock,
            last_claimed_block: fees.lastClaimedBlock,
            rewards_claimed,
        };
        Ok((record, weights))
    }

    async fn epochs(&self, block: u64) -> Result<(Vec<U256>, Vec<U256>), SnapshotError> {
        let core = self.config.core;
        let pairs = self
            .fan_out(1..=self.config.epochs, |epoch| async move {
                let rewards_call = ICoreSource::epochRewardsCall { epoch: U256::from(epoch) };
                let rewards = self
                    .with_retry("epochRewards", epoch, || {
                        call_view(&self.reader, core, &rewards_call, block)
                    })
                    .await?;
                let total_call =
                    ICoreSource::epochToTotalStakedWeightCall { epoch: U256::from(epoch) };
                let total = self
                    .with_retry("epochToTotalStakedWeight", epoch, || {
                        call_view(&self.reader, core, &total_call, block)
                    })
                    .await?;
                Ok::<_, SnapshotError>((rewards, total))
            })
            .await?;
        Ok(pairs.into_iter().unzip())
    }
}

/// Checks that `schema` declares every core event and view the builder relies on.
pub fn verify_core_abi(schema: &AbiSchema) -> Result<(), AbiError> {
    schema.require_event::<ICoreSource::AddChannel>()?;
    schema.require_event::<ICoreSource::UpdateChannel>()?;
    schema.require_event::<ICoreSource::AddDelegate>()?;
    schema.require_event::<ICoreSource::RemoveDelegate>()?;
    schema.require_event::<ICoreSource::Staked>()?;
    schema.require_event::<ICoreSource::Unstaked>()?;
    schema.require_event::<ICoreSource::RewardsHarvested>()?;
    schema.require_function::<ICoreSource::channelsCall>()?;
    schema.require_function::<ICoreSource::delegatedNotificationSendersCall>()?;
    schema.require_function::<ICoreSource::userFeesInfoCall>()?;
    schema.require_function::<ICoreSource::usersRewardsClaimedCall>()?;
    schema.require_function::<ICoreSource::epochRewardsCall>()?;
    schema.require_function::<ICoreSource::epochToTotalStakedWeightCall>()
}

fn inconsistent(key: EntityKey, reason: impl Display) -> SnapshotError {
    SnapshotError::Inconsistent { key: key.to_string(), reason: reason.to_string() }
}
