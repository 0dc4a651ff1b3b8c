//! Progress persistence errors.

use std::{fmt::Display, path::PathBuf};

use thiserror::Error;

/// Errors that can occur while persisting migration state.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// I/O error occurred while reading or writing a state file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another driver holds the stream's run lock.
    #[error("run lock {} is held by another process", path.display())]
    Locked {
        /// Lock file path.
        path: PathBuf,
    },

    /// Stored progress belongs to a different run.
    #[error("stored progress {field} is {stored}, expected {expected}")]
    Mismatch {
        /// Field that differs.
        field: &'static str,
        /// Stored value.
        stored: String,
        /// Value of the current run.
        expected: String,
    },
}

impl ProgressError {
    pub(crate) fn mismatch(field: &'static str, stored: impl Display, expected: impl Display) -> Self {
        Self::Mismatch { field, stored: stored.to_string(), expected: expected.to_string() }
    }
}
