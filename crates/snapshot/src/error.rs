//! Snapshot errors.

use std::path::PathBuf;

use shuttle_chain::ChainError;
use shuttle_events::AggregateError;
use shuttle_primitives::PrimitiveError;
use thiserror::Error;

/// Errors raised while building, validating or storing a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Event replay failed.
    #[error(transparent)]
    Events(AggregateError),

    /// A live read failed after retries.
    #[error("{what} read for {key} failed: {source}")]
    Read {
        /// Read kind.
        what: &'static str,
        /// Entity the read was for.
        key: String,
        /// Underlying chain error.
        #[source]
        source: ChainError,
    },

    /// Live state contradicts the data model.
    #[error("inconsistent data for {key}: {reason}")]
    Inconsistent {
        /// Offending entity.
        key: String,
        /// What was wrong.
        reason: String,
    },

    /// The build was cancelled.
    #[error("snapshot build cancelled")]
    Cancelled,

    /// Snapshot files are never overwritten.
    #[error("snapshot file {} already exists", path.display())]
    AlreadyExists {
        /// Existing file.
        path: PathBuf,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed snapshot document.
    #[error(transparent)]
    Format(#[from] PrimitiveError),

    /// The validator reported failures.
    #[error("snapshot validation failed with {failures} failure(s) and {warnings} warning(s)")]
    ValidationFailed {
        /// Fail findings.
        failures: usize,
        /// Warn findings.
        warnings: usize,
    },

    /// The validator reported warnings nobody acknowledged.
    #[error("snapshot has {warnings} unacknowledged warning(s)")]
    UnacknowledgedWarnings {
        /// Warn findings.
        warnings: usize,
    },
}

impl SnapshotError {
    /// Returns `true` for validation outcomes, as opposed to build or I/O failures.
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationFailed { .. } | Self::UnacknowledgedWarnings { .. })
    }

    pub(crate) fn read(what: &'static str, key: impl ToString, source: ChainError) -> Self {
        match source {
            ChainError::Cancelled => Self::Cancelled,
            source => Self::Read { what, key: key.to_string(), source },
        }
    }
}

impl From<AggregateError> for SnapshotError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::Cancelled => Self::Cancelled,
            err => Self::Events(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(SnapshotError::ValidationFailed { failures: 1, warnings: 0 }, true)]
    #[case(SnapshotError::UnacknowledgedWarnings { warnings: 2 }, true)]
    #[case(SnapshotError::Cancelled, false)]
    #[case(SnapshotError::Inconsistent { key: "k".to_string(), reason: "r".to_string() }, false)]
    fn test_is_validation(#[case] error: SnapshotError, #[case] expected: bool) {
        assert_eq!(error.is_validation(), expected);
    }

    #[test]
    fn cancellation_is_not_wrapped() {
        assert!(matches!(SnapshotError::from(AggregateError::Cancelled), SnapshotError::Cancelled));
        assert!(matches!(
            SnapshotError::read("channels", "0x01", ChainError::Cancelled),
            SnapshotError::Cancelled
        ));
    }

    #[test]
    fn read_error_names_the_key() {
        let err = SnapshotError::read("channels", "0xabc", ChainError::Timeout);
        assert_eq!(err.to_string(), "channels read for 0xabc failed: Request timed out");
    }
}
