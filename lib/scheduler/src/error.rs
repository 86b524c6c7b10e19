//! Error types for the scheduler crate.
//!
//! Per-run failures never surface here; the sweep counts them and moves on.
//! `SweepError` covers only failures that stop a whole pass.

use std::fmt;

/// Errors that abort a sweep pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepError {
    /// The run store could not list due runs.
    DueRunsUnavailable { reason: String },
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DueRunsUnavailable { reason } => {
                write!(f, "could not list due runs: {reason}")
            }
        }
    }
}

impl std::error::Error for SweepError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_error_display() {
        let err = SweepError::DueRunsUnavailable {
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("connection reset"));
    }
}
