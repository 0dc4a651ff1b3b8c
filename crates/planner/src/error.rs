//! Planning errors.

use thiserror::Error;

/// Errors raised when a batch plan cannot be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlanError {
    /// Batch size of zero.
    #[error("batch size must be greater than zero")]
    ZeroBatchSize,

    /// Resume cursor beyond the (possibly clipped) entity count.
    #[error("resume cursor {cursor} is past the end of the collection ({count} entities)")]
    CursorPastEnd {
        /// Requested cursor.
        cursor: usize,
        /// Effective entity count.
        count: usize,
    },
}
