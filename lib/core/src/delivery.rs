//! Delivery failures reported by outbound collaborators.
//!
//! Both the social message dispatcher and the email sender report failures
//! as either retryable (worth another attempt) or terminal (no amount of
//! retrying will help, e.g. the recipient blocked the account).

use std::fmt;

/// A failed delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// Transient failure; the caller may retry within its attempt budget.
    Retryable { reason: String },
    /// Permanent failure; the caller must not retry.
    Terminal { reason: String },
}

impl SendError {
    /// Creates a retryable failure.
    #[must_use]
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::Retryable {
            reason: reason.into(),
        }
    }

    /// Creates a terminal failure.
    #[must_use]
    pub fn terminal(reason: impl Into<String>) -> Self {
        Self::Terminal {
            reason: reason.into(),
        }
    }

    /// Returns true if another attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Returns the failure reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Retryable { reason } | Self::Terminal { reason } => reason,
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable { reason } => write!(f, "delivery failed (retryable): {reason}"),
            Self::Terminal { reason } => write!(f, "delivery failed (terminal): {reason}"),
        }
    }
}

impl std::error::Error for SendError {}
