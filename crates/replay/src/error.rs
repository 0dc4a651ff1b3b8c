//! Replay errors.

use shuttle_chain::ChainError;
use shuttle_planner::{BatchRange, PlanError};
use shuttle_progress::ProgressError;
use thiserror::Error;

use crate::StreamKind;

/// Errors that stop a replay run.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The batch plan could not be built.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Progress could not be loaded, matched or saved.
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// A parallel array of a batch has the wrong length.
    #[error("{stream} batch {range}: {array} has {len} element(s), expected {expected}")]
    LengthMismatch {
        /// Stream being replayed.
        stream: StreamKind,
        /// Offending batch.
        range: BatchRange,
        /// Parameter name of the array.
        array: &'static str,
        /// Actual length.
        len: usize,
        /// `end - start`.
        expected: usize,
    },

    /// Progress exists but the run was not asked to resume it.
    #[error("{stream} has stored progress at cursor {cursor}; pass --resume to continue it")]
    ResumeRequired {
        /// Stream being replayed.
        stream: StreamKind,
        /// Stored cursor.
        cursor: usize,
    },

    /// A batch failed for good. Progress stays at the last confirmed batch.
    #[error("{stream} batch {range} failed after {attempts} attempt(s): {source}")]
    Halted {
        /// Stream being replayed.
        stream: StreamKind,
        /// Failed batch.
        range: BatchRange,
        /// Attempts made.
        attempts: u32,
        /// Last error.
        #[source]
        source: ChainError,
    },

    /// The run was cancelled.
    #[error("{stream} replay cancelled at cursor {cursor}")]
    Cancelled {
        /// Stream being replayed.
        stream: StreamKind,
        /// Cursor of the last confirmed batch.
        cursor: usize,
    },
}

impl ReplayError {
    /// Returns `true` for errors caused by the run's inputs rather than by the chain.
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Plan(_)
                | Self::LengthMismatch { .. }
                | Self::ResumeRequired { .. }
                | Self::Progress(ProgressError::Mismatch { .. } | ProgressError::Locked { .. })
        )
    }

    /// Returns `true` if the run was cancelled.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
