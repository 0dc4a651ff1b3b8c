//! Append-only audit trail.

use std::{
    ffi::OsString,
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Serialize};
use shuttle_primitives::B256;

use crate::ProgressError;

/// An auditable run event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A driver started or resumed a stream.
    RunStarted {
        /// Stream name.
        stream: String,
        /// Snapshot digest.
        snapshot_digest: B256,
        /// Entities in the stream.
        entity_count: usize,
        /// Cursor the run starts at.
        cursor: usize,
        /// Whether this run resumes stored progress.
        resumed: bool,
    },
    /// The operator accepted validator warnings.
    WarningsAcknowledged {
        /// Rendered findings.
        findings: Vec<String>,
    },
    /// A batch was confirmed on the destination.
    BatchConfirmed {
        /// First index.
        start: usize,
        /// Last index, exclusive.
        end: usize,
        /// Transaction hash.
        tx_hash: B256,
        /// Inclusion block.
        block_number: u64,
        /// Attempts used.
        attempts: u32,
    },
    /// A batch reverted with an idempotence signal and was treated as done.
    BatchIdempotent {
        /// First index.
        start: usize,
        /// Last index, exclusive.
        end: usize,
        /// Revert reason.
        reason: String,
    },
    /// The run stopped on a failed batch.
    Halted {
        /// First index.
        start: usize,
        /// Last index, exclusive.
        end: usize,
        /// Final error.
        error: String,
    },
    /// The run was cancelled.
    Cancelled {
        /// Cursor at cancellation.
        cursor: usize,
    },
    /// Every batch is confirmed.
    Completed {
        /// Final cursor.
        cursor: usize,
    },
}

/// One line of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Unix timestamp.
    pub at: u64,
    /// The event.
    #[serde(flatten)]
    pub event: AuditEvent,
}

#[derive(Debug)]
enum Sink {
    File(Mutex<File>),
    Memory(Mutex<Vec<AuditRecord>>),
}

/// JSON lines audit trail.
#[derive(Debug)]
pub struct AuditLog {
    sink: Sink,
}

impl AuditLog {
    /// Audit file path kept next to `progress_path`.
    pub fn path_for(progress_path: &Path) -> PathBuf {
        let mut name = OsString::from(progress_path.as_os_str());
        name.push(".audit.jsonl");
        PathBuf::from(name)
    }

    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self, ProgressError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { sink: Sink::File(Mutex::new(file)) })
    }

    /// Creates an in-memory trail.
    pub fn memory() -> Self {
        Self { sink: Sink::Memory(Mutex::new(Vec::new())) }
    }

    /// Appends `event`.
    pub fn record(&self, event: AuditEvent) -> Result<(), ProgressError> {
        let at = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let record = AuditRecord { at, event };
        match &self.sink {
            Sink::File(file) => {
                let mut line = serde_json::to_vec(&record)?;
                line.push(b'\n');
                let mut file = file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                file.write_all(&line)?;
                file.flush()?;
            }
            Sink::Memory(records) => {
                records.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(record);
            }
        }
        Ok(())
    }

    /// Events recorded by an in-memory trail. Empty for file trails.
    pub fn events(&self) -> Vec<AuditEvent> {
        match &self.sink {
            Sink::File(_) => Vec::new(),
            Sink::Memory(records) => records
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .iter()
                .map(|r| r.event.clone())
                .collect(),
        }
    }

    /// Reads every record of a trail file.
    pub fn read(path: &Path) -> Result<Vec<AuditRecord>, ProgressError> {
        std::fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(ProgressError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn file_trail_appends_across_opens() {
        let dir = TempDir::new().unwrap();
        let path = AuditLog::path_for(&dir.path().join("epochs.json"));
        assert!(path.ends_with("epochs.json.audit.jsonl"));

        AuditLog::open(&path)
            .unwrap()
            .record(AuditEvent::Completed { cursor: 3 })
            .unwrap();
        AuditLog::open(&path)
            .unwrap()
            .record(AuditEvent::Cancelled { cursor: 1 })
            .unwrap();

        let records = AuditLog::read(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].event, AuditEvent::Completed { cursor: 3 });
        assert_eq!(records[1].event, AuditEvent::Cancelled { cursor: 1 });
    }

    #[test]
    fn records_are_tagged_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::open(&path).unwrap();
        log.record(AuditEvent::BatchIdempotent {
            start: 0,
            end: 2,
            reason: "already migrated".to_string(),
        })
        .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(value["event"], "batch_idempotent");
        assert_eq!(value["reason"], "already migrated");
        assert!(value["at"].as_u64().unwrap() > 0);
    }

    #[test]
    fn memory_trail_keeps_events() {
        let log = AuditLog::memory();
        log.record(AuditEvent::WarningsAcknowledged { findings: vec!["w".to_string()] })
            .unwrap();
        assert_eq!(
            log.events(),
            vec![AuditEvent::WarningsAcknowledged { findings: vec!["w".to_string()] }]
        );
    }
}
