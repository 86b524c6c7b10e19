//! Error types for the automation crate.

use creator_flow_conversation::HistoryError;
use creator_flow_core::{AutomationId, CreatorId, KeywordId, SendError};
use std::fmt;

/// Errors from automation records and their store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutomationError {
    /// Automation with the given ID was not found.
    NotFound { automation_id: AutomationId },
    /// Keyword with the given ID was not found on the automation.
    KeywordNotFound { keyword_id: KeywordId },
    /// A keyword was empty after trimming.
    EmptyKeyword,
    /// A listener template or prompt was empty.
    EmptyListener { field: &'static str },
    /// Activation requires at least one trigger type.
    NoTriggerTypes { automation_id: AutomationId },
    /// Active automations cannot be deleted.
    StillActive { automation_id: AutomationId },
    /// A write raced with another writer.
    VersionConflict { expected: u64, found: u64 },
    /// The backing store failed.
    StorageFailed { reason: String },
}

impl fmt::Display for AutomationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { automation_id } => {
                write!(f, "automation not found: {automation_id}")
            }
            Self::KeywordNotFound { keyword_id } => write!(f, "keyword not found: {keyword_id}"),
            Self::EmptyKeyword => write!(f, "keyword must not be empty"),
            Self::EmptyListener { field } => write!(f, "listener {field} must not be empty"),
            Self::NoTriggerTypes { automation_id } => write!(
                f,
                "automation {automation_id} needs at least one trigger type before activation"
            ),
            Self::StillActive { automation_id } => {
                write!(f, "automation {automation_id} is active; deactivate it first")
            }
            Self::VersionConflict { expected, found } => {
                write!(f, "version conflict: expected {expected}, found {found}")
            }
            Self::StorageFailed { reason } => write!(f, "storage failed: {reason}"),
        }
    }
}

impl std::error::Error for AutomationError {}

/// Errors from listener resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// The creator's subscription tier does not include conversational listeners.
    CapabilityDenied { creator_id: CreatorId },
    /// The automation has no listener configured.
    MissingListener { automation_id: AutomationId },
    /// The capability check could not answer.
    CapabilityUnavailable { reason: String },
    /// The conversation history store failed.
    History(HistoryError),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapabilityDenied { creator_id } => write!(
                f,
                "conversational replies are not included in the plan for creator {creator_id}"
            ),
            Self::MissingListener { automation_id } => {
                write!(f, "automation {automation_id} has no listener")
            }
            Self::CapabilityUnavailable { reason } => {
                write!(f, "capability check unavailable: {reason}")
            }
            Self::History(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<HistoryError> for ResolveError {
    fn from(err: HistoryError) -> Self {
        Self::History(err)
    }
}

/// Errors from the conversational agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentError {
    /// The agent could not produce a reply.
    ReplyFailed { reason: String },
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplyFailed { reason } => write!(f, "agent reply failed: {reason}"),
        }
    }
}

impl std::error::Error for AgentError {}

/// Errors surfaced by the dispatcher to the event-ingestion caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Loading or updating automations failed.
    Store(AutomationError),
    /// Resolution failed for a reason other than a capability denial.
    Resolve(ResolveError),
    /// The agent failed to reply.
    Agent(AgentError),
    /// Message delivery failed terminally or ran out of attempts.
    Send(SendError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(err) => write!(f, "automation store error: {err}"),
            Self::Resolve(err) => write!(f, "listener resolution failed: {err}"),
            Self::Agent(err) => write!(f, "{err}"),
            Self::Send(err) => write!(f, "message dispatch failed: {err}"),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<AutomationError> for DispatchError {
    fn from(err: AutomationError) -> Self {
        Self::Store(err)
    }
}

impl From<ResolveError> for DispatchError {
    fn from(err: ResolveError) -> Self {
        Self::Resolve(err)
    }
}

impl From<HistoryError> for DispatchError {
    fn from(err: HistoryError) -> Self {
        Self::Resolve(ResolveError::History(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_denied_names_the_creator() {
        let creator_id = CreatorId::new();
        let err = ResolveError::CapabilityDenied { creator_id };
        assert!(err.to_string().contains(&creator_id.to_string()));
    }

    #[test]
    fn dispatch_error_wraps_send_error() {
        let err = DispatchError::Send(SendError::terminal("blocked"));
        assert!(err.to_string().contains("blocked"));
    }
}
