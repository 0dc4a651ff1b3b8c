//! Chain access error types.

use alloy::primitives::B256;
use thiserror::Error;

/// Errors surfaced by [`ChainReader`](crate::ChainReader) and [`ChainWriter`](crate::ChainWriter).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Generic RPC failure.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The endpoint throttled the request.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// The request did not complete in time.
    #[error("Request timed out")]
    Timeout,

    /// Execution reverted, with the decoded reason when one was available.
    #[error("Execution reverted: {}", reason.as_deref().unwrap_or("<no reason>"))]
    Reverted {
        /// Revert reason string.
        reason: Option<String>,
    },

    /// The transaction was not confirmed before the deadline.
    #[error("Timeout waiting for confirmation of {0}")]
    ConfirmationTimeout(B256),

    /// Nonce too low.
    #[error("Nonce too low")]
    NonceTooLow,

    /// Insufficient funds.
    #[error("Insufficient funds")]
    InsufficientFunds,

    /// A response could not be decoded.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// The chain handle has no signer configured.
    #[error("No sender configured for transaction submission")]
    ReadOnly,
}

impl ChainError {
    /// Classifies an RPC error string into the appropriate variant.
    pub fn from_rpc_error(msg: &str) -> Self {
        let lower = msg.to_lowercase();

        if lower.contains("revert") {
            Self::Reverted { reason: extract_revert_reason(msg) }
        } else if lower.contains("rate limit") || lower.contains("too many requests") {
            Self::RateLimited(msg.to_string())
        } else if lower.contains("timed out") || lower.contains("timeout") {
            Self::Timeout
        } else if lower.contains("nonce too low") {
            Self::NonceTooLow
        } else if lower.contains("insufficient funds") || lower.contains("insufficient balance") {
            Self::InsufficientFunds
        } else {
            Self::Rpc(msg.to_string())
        }
    }

    /// Returns the revert reason, if this is a revert that carried one.
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Reverted { reason } => reason.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if this is a revert whose reason contains one of `signals`.
    ///
    /// Matching is case-insensitive.
    pub fn is_revert_with<S: AsRef<str>>(&self, signals: &[S]) -> bool {
        let Some(reason) = self.revert_reason() else {
            return false;
        };
        let reason = reason.to_lowercase();
        signals.iter().any(|s| reason.contains(&s.as_ref().to_lowercase()))
    }
}

/// Pulls the human readable reason out of an `execution reverted: <reason>` message.
fn extract_revert_reason(msg: &str) -> Option<String> {
    let lower = msg.to_ascii_lowercase();
    let idx = lower.find("reverted:")?;
    let reason = msg[idx + "reverted:".len()..].trim().trim_matches('"');
    (!reason.is_empty()).then(|| reason.to_string())
}

/// Trait for determining if an error is retryable.
pub trait Retryable {
    /// Returns true if the error is retryable.
    fn is_retryable(&self) -> bool;
}

impl Retryable for ChainError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Rpc(_)
                | Self::RateLimited(_)
                | Self::Timeout
                | Self::ConfirmationTimeout(_)
                | Self::NonceTooLow
        )
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ChainError::Rpc("connection reset".to_string()), true)]
    #[case(ChainError::RateLimited("429".to_string()), true)]
    #[case(ChainError::Timeout, true)]
    #[case(ChainError::ConfirmationTimeout(B256::ZERO), true)]
    #[case(ChainError::NonceTooLow, true)]
    #[case(ChainError::Reverted { reason: None }, false)]
    #[case(ChainError::InsufficientFunds, false)]
    #[case(ChainError::Decode("bad".to_string()), false)]
    #[case(ChainError::Cancelled, false)]
    #[case(ChainError::ReadOnly, false)]
    fn test_is_retryable(#[case] error: ChainError, #[case] expected: bool) {
        assert_eq!(error.is_retryable(), expected);
    }

    #[rstest]
    #[case("HTTP error 429 Too Many Requests", "RateLimited")]
    #[case("daily rate limit exceeded", "RateLimited")]
    #[case("request timed out", "Timeout")]
    #[case("nonce too low: next nonce 5, tx nonce 4", "NonceTooLow")]
    #[case("insufficient funds for gas * price + value", "InsufficientFunds")]
    #[case("execution reverted: already migrated", "Reverted")]
    #[case("connection refused", "Rpc")]
    fn test_from_rpc_error(#[case] msg: &str, #[case] variant: &str) {
        let err = ChainError::from_rpc_error(msg);
        let name = match err {
            ChainError::Rpc(_) => "Rpc",
            ChainError::RateLimited(_) => "RateLimited",
            ChainError::Timeout => "Timeout",
            ChainError::NonceTooLow => "NonceTooLow",
            ChainError::InsufficientFunds => "InsufficientFunds",
            ChainError::Reverted { .. } => "Reverted",
            _ => "other",
        };
        assert_eq!(name, variant);
    }

    #[test]
    fn test_revert_reason_extraction() {
        let err = ChainError::from_rpc_error("server returned an error response: execution reverted: Already Migrated");
        assert_eq!(err.revert_reason(), Some("Already Migrated"));
        assert!(err.is_revert_with(&["already migrated"]));
        assert!(!err.is_revert_with(&["invalid length"]));
    }

    #[test]
    fn test_revert_without_reason() {
        let err = ChainError::from_rpc_error("execution reverted");
        assert_eq!(err, ChainError::Reverted { reason: None });
        assert!(!err.is_revert_with(&["already migrated"]));
        assert_eq!(err.to_string(), "Execution reverted: <no reason>");
    }

    #[test]
    fn test_confirmation_timeout_display() {
        let err = ChainError::ConfirmationTimeout(B256::ZERO);
        assert_eq!(
            err.to_string(),
            format!("Timeout waiting for confirmation of {}", B256::ZERO)
        );
    }
}
