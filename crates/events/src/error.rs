//! Event aggregation errors.

use shuttle_chain::ChainError;
use thiserror::Error;

/// Errors raised while replaying event history.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// Window size is zero or not larger than the overlap.
    #[error("invalid window configuration: size {window_size}, overlap {overlap}")]
    InvalidWindow {
        /// Configured window size.
        window_size: u64,
        /// Configured overlap.
        overlap: u64,
    },

    /// Two consecutive windows disagree on the logs in their shared range.
    #[error(
        "inconsistent logs in overlap of windows {}..={} and {}..={}",
        previous.0, previous.1, current.0, current.1
    )]
    InconsistentWindow {
        /// Earlier window, inclusive bounds.
        previous: (u64, u64),
        /// Later window, inclusive bounds.
        current: (u64, u64),
    },

    /// A log could not be decoded as the expected event.
    #[error("undecodable {event} log at block {block_number} index {log_index}: {reason}")]
    Decode {
        /// Event signature.
        event: &'static str,
        /// Block of the log.
        block_number: u64,
        /// Index of the log within its block.
        log_index: u64,
        /// Decoder message.
        reason: String,
    },

    /// A window query failed after retries.
    #[error("log query for blocks {from_block}..={to_block} failed: {source}")]
    Query {
        /// First block of the window.
        from_block: u64,
        /// Last block of the window.
        to_block: u64,
        /// Underlying chain error.
        #[source]
        source: ChainError,
    },

    /// The replay was cancelled.
    #[error("event replay cancelled")]
    Cancelled,
}

impl AggregateError {
    /// Returns `true` for errors caused by the chain data rather than the environment.
    pub const fn is_inconsistency(&self) -> bool {
        matches!(self, Self::InconsistentWindow { .. } | Self::Decode { .. })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(AggregateError::InvalidWindow { window_size: 0, overlap: 0 }, false)]
    #[case(AggregateError::InconsistentWindow { previous: (0, 9), current: (8, 17) }, true)]
    #[case(
        AggregateError::Decode { event: "E()", block_number: 1, log_index: 0, reason: String::new() },
        true
    )]
    #[case(
        AggregateError::Query { from_block: 0, to_block: 1, source: ChainError::Timeout },
        false
    )]
    #[case(AggregateError::Cancelled, false)]
    fn test_is_inconsistency(#[case] error: AggregateError, #[case] expected: bool) {
        assert_eq!(error.is_inconsistency(), expected);
    }

    #[test]
    fn test_inconsistent_window_display() {
        let err = AggregateError::InconsistentWindow { previous: (0, 9), current: (8, 17) };
        assert_eq!(err.to_string(), "inconsistent logs in overlap of windows 0..=9 and 8..=17");
    }
}
