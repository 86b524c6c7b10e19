//! Error types for the conversation crate.

use std::fmt;

/// Errors from conversation history operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// Storage operation failed.
    StorageFailed { reason: String },
    /// A turn was rejected before storage.
    InvalidTurn { reason: String },
}

impl fmt::Display for HistoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFailed { reason } => {
                write!(f, "conversation storage failed: {reason}")
            }
            Self::InvalidTurn { reason } => write!(f, "invalid conversation turn: {reason}"),
        }
    }
}

impl std::error::Error for HistoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_error_display() {
        let err = HistoryError::StorageFailed {
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("conversation storage failed"));
        assert!(err.to_string().contains("disk full"));
    }
}
