//! Replay run summary.

use std::fmt;

use crate::StreamKind;

/// What a replay run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// Stream replayed.
    pub stream: StreamKind,
    /// Whether nothing was sent.
    pub dry_run: bool,
    /// Cursor the run started at.
    pub start_cursor: usize,
    /// Cursor after the last confirmed (or, in a dry run, encoded) batch.
    pub cursor: usize,
    /// Batches planned.
    pub planned: usize,
    /// Transactions sent, retries included.
    pub submitted: usize,
    /// Batches confirmed.
    pub confirmed: usize,
    /// Batches the destination already held.
    pub idempotent: usize,
    /// Failed attempts that were retried.
    pub retries: usize,
}

impl ReplayReport {
    pub(crate) const fn new(stream: StreamKind, start_cursor: usize, dry_run: bool) -> Self {
        Self {
            stream,
            dry_run,
            start_cursor,
            cursor: start_cursor,
            planned: 0,
            submitted: 0,
            confirmed: 0,
            idempotent: 0,
            retries: 0,
        }
    }

    /// Entities the run moved the cursor over.
    pub const fn advanced(&self) -> usize {
        self.cursor - self.start_cursor
    }
}

impl fmt::Display for ReplayReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            return write!(
                f,
                "{}: dry run encoded {} batch(es) covering [{}, {})",
                self.stream, self.planned, self.start_cursor, self.cursor
            );
        }
        write!(
            f,
            "{}: cursor {} -> {}, {} confirmed, {} already migrated, {} sent, {} retried",
            self.stream,
            self.start_cursor,
            self.cursor,
            self.confirmed,
            self.idempotent,
            self.submitted,
            self.retries
        )
    }
}
