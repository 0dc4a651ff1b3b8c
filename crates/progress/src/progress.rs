//! Resume state of a migration stream.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use shuttle_planner::BatchRange;
use shuttle_primitives::B256;

use crate::ProgressError;

/// Progress of one migration stream.
///
/// `batch_cursor` is the index of the first entity not yet confirmed on the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationProgress {
    /// Stream name.
    pub stream: String,
    /// Digest of the snapshot file being replayed.
    pub snapshot_digest: B256,
    /// Number of entities in the stream.
    pub entity_count: usize,
    /// First entity index not yet confirmed.
    pub batch_cursor: usize,
    /// Sequence number of the last confirmed batch, counted from zero.
    pub last_confirmed_batch: Option<u64>,
    /// Failed submission attempts over the stream's lifetime.
    pub failure_count: u64,
    /// Unix timestamp of last update.
    pub updated_at: u64,
}

impl MigrationProgress {
    /// Creates progress for a fresh run starting at `cursor`.
    pub fn new(
        stream: impl Into<String>,
        snapshot_digest: B256,
        entity_count: usize,
        cursor: usize,
    ) -> Self {
        Self {
            stream: stream.into(),
            snapshot_digest,
            entity_count,
            batch_cursor: cursor,
            last_confirmed_batch: None,
            failure_count: 0,
            updated_at: 0,
        }
    }

    /// Checks that stored progress belongs to the run about to resume.
    pub fn ensure_matches(
        &self,
        stream: &str,
        snapshot_digest: B256,
        entity_count: usize,
    ) -> Result<(), ProgressError> {
        if self.stream != stream {
            return Err(ProgressError::mismatch("stream", &self.stream, stream));
        }
        if self.snapshot_digest != snapshot_digest {
            return Err(ProgressError::mismatch(
                "snapshot digest",
                self.snapshot_digest,
                snapshot_digest,
            ));
        }
        if self.entity_count != entity_count {
            return Err(ProgressError::mismatch("entity count", self.entity_count, entity_count));
        }
        Ok(())
    }

    /// Records a confirmed (or idempotently skipped) batch and advances the cursor to its end.
    pub fn record_confirmed(&mut self, batch: BatchRange) {
        if batch.end > self.batch_cursor {
            self.batch_cursor = batch.end;
        }
        self.last_confirmed_batch = Some(self.last_confirmed_batch.map_or(0, |n| n + 1));
    }

    /// Records a failed submission attempt. The cursor does not move.
    pub const fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    /// Returns `true` once every entity is confirmed.
    pub const fn is_complete(&self) -> bool {
        self.batch_cursor >= self.entity_count
    }

    /// Updates the timestamp to the current time.
    pub fn touch(&mut self) {
        self.updated_at =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress() -> MigrationProgress {
        MigrationProgress::new("channels", B256::repeat_byte(0xaa), 155, 100)
    }

    #[test]
    fn fresh_progress() {
        let p = progress();
        assert_eq!(p.batch_cursor, 100);
        assert_eq!(p.last_confirmed_batch, None);
        assert_eq!(p.failure_count, 0);
        assert!(!p.is_complete());
    }

    #[test]
    fn confirmations_advance_the_cursor() {
        let mut p = progress();
        p.record_confirmed(BatchRange::new(100, 102));
        assert_eq!(p.batch_cursor, 102);
        assert_eq!(p.last_confirmed_batch, Some(0));
        p.record_confirmed(BatchRange::new(102, 155));
        assert_eq!(p.batch_cursor, 155);
        assert_eq!(p.last_confirmed_batch, Some(1));
        assert!(p.is_complete());
    }

    #[test]
    fn failures_leave_the_cursor() {
        let mut p = progress();
        p.record_failure();
        p.record_failure();
        assert_eq!(p.failure_count, 2);
        assert_eq!(p.batch_cursor, 100);
    }

    #[test]
    fn mismatch_is_detected() {
        let p = progress();
        p.ensure_matches("channels", B256::repeat_byte(0xaa), 155).unwrap();
        assert!(matches!(
            p.ensure_matches("stakers", B256::repeat_byte(0xaa), 155),
            Err(ProgressError::Mismatch { field: "stream", .. })
        ));
        assert!(matches!(
            p.ensure_matches("channels", B256::ZERO, 155),
            Err(ProgressError::Mismatch { field: "snapshot digest", .. })
        ));
        assert!(matches!(
            p.ensure_matches("channels", B256::repeat_byte(0xaa), 154),
            Err(ProgressError::Mismatch { field: "entity count", .. })
        ));
    }

    #[test]
    fn json_shape() {
        let value = serde_json::to_value(progress()).unwrap();
        assert_eq!(value["batchCursor"], 100);
        assert_eq!(value["lastConfirmedBatch"], serde_json::Value::Null);
        assert_eq!(value["snapshotDigest"], format!("{}", B256::repeat_byte(0xaa)));
    }

    #[test]
    fn test_touch() {
        let mut p = progress();
        p.touch();
        assert!(p.updated_at > 0);
    }
}
