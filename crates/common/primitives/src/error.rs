//! Primitive decoding errors.

use thiserror::Error;

/// Errors converting raw on-chain values into typed records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// Channel type code outside the known enum range.
    #[error("Unknown channel type code: {0}")]
    UnknownChannelType(u8),

    /// Channel state code outside the known enum range.
    #[error("Unknown channel state code: {0}")]
    UnknownChannelState(u8),

    /// Snapshot document could not be parsed.
    #[error("Invalid snapshot document: {0}")]
    InvalidSnapshot(String),
}

impl From<serde_json::Error> for PrimitiveError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidSnapshot(err.to_string())
    }
}
