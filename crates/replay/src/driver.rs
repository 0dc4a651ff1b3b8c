//! The replay driver.

use std::future::Future;

use alloy::primitives::{Address, B256};
use shuttle_chain::{ChainError, ChainWriter, Retryable, TxReceipt};
use shuttle_planner::BatchPlanner;
use shuttle_progress::{AuditEvent, AuditLog, MigrationProgress, ProgressStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{EncodedBatch, MigrationStream, ReplayConfig, ReplayError, ReplayReport, StreamKind};

/// How a batch left the `Submitted` state for good.
#[derive(Debug)]
enum Settled {
    /// Mined and confirmed.
    Confirmed { receipt: TxReceipt, attempts: u32 },
    /// Reverted with an idempotence signal.
    AlreadyApplied { reason: String },
}

/// Why a batch could not be settled.
#[derive(Debug)]
enum Unsettled {
    Cancelled,
    Halted { attempts: u32, error: ChainError },
}

/// Replays one migration stream into the destination contract.
///
/// Batches are strictly sequential: a batch is only sent once the previous one is confirmed
/// and its progress saved.
#[derive(Debug)]
pub struct ReplayDriver<W, S> {
    writer: W,
    destination: Address,
    store: S,
    audit: AuditLog,
    config: ReplayConfig,
    cancel: CancellationToken,
}

impl<W: ChainWriter, S: ProgressStore> ReplayDriver<W, S> {
    /// Creates a new driver targeting `destination`.
    pub fn new(
        writer: W,
        destination: Address,
        store: S,
        audit: AuditLog,
        config: ReplayConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self { writer, destination, store, audit, config, cancel }
    }

    /// Returns the driver configuration.
    pub const fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Returns the progress store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the audit trail.
    pub const fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Replays `stream`, built from the snapshot whose file digest is `snapshot_digest`.
    pub async fn run(
        &self,
        stream: &dyn MigrationStream,
        snapshot_digest: B256,
    ) -> Result<ReplayReport, ReplayError> {
        let kind = stream.kind();
        let entity_count = stream.entity_count();
        let (mut progress, resumed) = self.load_progress(kind, snapshot_digest, entity_count)?;

        let batches = BatchPlanner::new(self.config.batch_size)
            .with_end(self.config.end)
            .plan(entity_count, progress.batch_cursor)?;
        let mut report = ReplayReport::new(kind, progress.batch_cursor, self.config.dry_run);
        report.planned = batches.len();

        info!(
            stream = %kind,
            entity_count,
            cursor = progress.batch_cursor,
            batches = batches.len(),
            batch_size = self.config.batch_size,
            resumed,
            dry_run = self.config.dry_run,
            "Starting replay"
        );

        if self.config.dry_run {
            for range in batches {
                let batch = stream.encode(range);
                batch.check_lengths(kind)?;
                info!(stream = %kind, %range, calldata_bytes = batch.calldata.len(), "Encoded batch (dry run)");
                report.cursor = range.end;
            }
            return Ok(report);
        }

        self.audit.record(AuditEvent::RunStarted {
            stream: kind.to_string(),
            snapshot_digest,
            entity_count,
            cursor: progress.batch_cursor,
            resumed,
        })?;

        for range in batches {
            let batch = stream.encode(range);
            batch.check_lengths(kind)?;

            match self.settle(&batch, &mut progress, &mut report).await {
                Ok(settled) => {
                    progress.record_confirmed(range);
                    progress.touch();
                    self.store.save(&progress)?;
                    report.cursor = progress.batch_cursor;

                    match settled {
                        Settled::Confirmed { receipt, attempts } => {
                            report.confirmed += 1;
                            info!(stream = %kind, %range, tx = %receipt.tx_hash, block = receipt.block_number, attempts, "Batch confirmed");
                            self.audit.record(AuditEvent::BatchConfirmed {
                                start: range.start,
                                end: range.end,
                                tx_hash: receipt.tx_hash,
                                block_number: receipt.block_number,
                                attempts,
                            })?;
                        }
                        Settled::AlreadyApplied { reason } => {
                            report.idempotent += 1;
                            info!(stream = %kind, %range, %reason, "Batch already migrated, advancing");
                            self.audit.record(AuditEvent::BatchIdempotent {
                                start: range.start,
                                end: range.end,
                                reason,
                            })?;
                        }
                    }
                }
                Err(Unsettled::Cancelled) => {
                    progress.touch();
                    self.store.save(&progress)?;
                    warn!(stream = %kind, cursor = progress.batch_cursor, "Replay cancelled");
                    self.audit.record(AuditEvent::Cancelled { cursor: progress.batch_cursor })?;
                    return Err(ReplayError::Cancelled { stream: kind, cursor: progress.batch_cursor });
                }
                Err(Unsettled::Halted { attempts, error }) => {
                    progress.touch();
                    self.store.save(&progress)?;
                    warn!(stream = %kind, %range, attempts, %error, cursor = progress.batch_cursor, "Replay halted");
                    self.audit.record(AuditEvent::Halted {
                        start: range.start,
                        end: range.end,
                        error: error.to_string(),
                    })?;
                    return Err(ReplayError::Halted { stream: kind, range, attempts, source: error });
                }
            }
        }

        if progress.is_complete() {
            self.audit.record(AuditEvent::Completed { cursor: progress.batch_cursor })?;
            info!(stream = %kind, cursor = progress.batch_cursor, "Replay complete");
        } else {
            info!(stream = %kind, cursor = progress.batch_cursor, entity_count, "Reached end bound");
        }
        Ok(report)
    }

    fn load_progress(
        &self,
        kind: StreamKind,
        snapshot_digest: B256,
        entity_count: usize,
    ) -> Result<(MigrationProgress, bool), ReplayError> {
        let Some(stored) = self.store.load()? else {
            if self.config.resume {
                info!(stream = %kind, "No stored progress, starting fresh");
            }
            let cursor = self.config.start.unwrap_or(0);
            return Ok((MigrationProgress::new(kind.as_str(), snapshot_digest, entity_count, cursor), false));
        };

        stored.ensure_matches(kind.as_str(), snapshot_digest, entity_count)?;
        if !self.config.resume && !self.config.dry_run {
            return Err(ReplayError::ResumeRequired { stream: kind, cursor: stored.batch_cursor });
        }
        if let Some(start) = self.config.start.filter(|s| *s != stored.batch_cursor) {
            warn!(stream = %kind, start, cursor = stored.batch_cursor, "Ignoring start index, resuming from the stored cursor");
        }
        Ok((stored, true))
    }

    /// Drives one batch from `Pending` to a settled state, sending a fresh transaction on
    /// every attempt.
    async fn settle(
        &self,
        batch: &EncodedBatch,
        progress: &mut MigrationProgress,
        report: &mut ReplayReport,
    ) -> Result<Settled, Unsettled> {
        let policy = &self.config.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            let error = match self.attempt(batch, report).await {
                Ok(receipt) => return Ok(Settled::Confirmed { receipt, attempts }),
                Err(ChainError::Cancelled) => return Err(Unsettled::Cancelled),
                Err(error) => error,
            };

            if error.is_revert_with(&self.config.idempotence_signals) {
                let reason = error.revert_reason().unwrap_or_default().to_string();
                return Ok(Settled::AlreadyApplied { reason });
            }

            progress.record_failure();
            let transient = error.is_retryable() || matches!(error, ChainError::Reverted { .. });
            if !transient || attempts >= max_attempts {
                return Err(Unsettled::Halted { attempts, error });
            }

            let backoff = policy.backoff(attempts);
            warn!(range = %batch.range, attempt = attempts, max_attempts, ?backoff, %error, "Batch failed, retrying with a fresh transaction");
            report.retries += 1;
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Unsettled::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn attempt(
        &self,
        batch: &EncodedBatch,
        report: &mut ReplayReport,
    ) -> Result<TxReceipt, ChainError> {
        let handle = self
            .cancellable(self.writer.send_transaction(
                self.destination,
                batch.calldata.clone(),
                &self.config.gas,
            ))
            .await?;
        report.submitted += 1;
        debug!(range = %batch.range, tx = %handle.hash, nonce = handle.nonce, "Submitted batch");

        self.cancellable(self.writer.wait_for_confirmation(
            &handle,
            self.config.confirmations,
            self.config.confirmation_timeout,
        ))
        .await
    }

    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, ChainError>>,
    ) -> Result<T, ChainError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ChainError::Cancelled),
            result = fut => result,
        }
    }
}
