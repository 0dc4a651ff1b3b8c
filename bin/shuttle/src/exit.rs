//! Process exit codes.

use std::process::ExitCode;

use shuttle_replay::ReplayError;
use shuttle_snapshot::SnapshotError;

/// Outcome of a `shuttle` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exit {
    Success,
    /// Bad input, configuration or any error not classified below.
    Failure,
    /// The snapshot failed validation or carries unacknowledged warnings.
    Validation,
    /// A batch halted.
    Replay,
    Cancelled,
}

impl Exit {
    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Validation => 2,
            Self::Replay => 3,
            Self::Cancelled => 130,
        }
    }

    /// Picks the exit code for an error that ended the run.
    pub(crate) fn classify(err: &eyre::Report) -> Self {
        if let Some(err) = err.downcast_ref::<ReplayError>() {
            return if err.is_cancelled() {
                Self::Cancelled
            } else if err.is_configuration() {
                Self::Failure
            } else {
                Self::Replay
            };
        }
        match err.downcast_ref::<SnapshotError>() {
            Some(err) if err.is_validation() => Self::Validation,
            Some(SnapshotError::Cancelled) => Self::Cancelled,
            _ => Self::Failure,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        Self::from(exit.code())
    }
}
