//! Turn types for conversations.

use chrono::{DateTime, Utc};
use creator_flow_core::MessageId;
use serde::{Deserialize, Serialize};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The social actor who messaged the creator.
    User,
    /// The conversational agent replying on the creator's behalf.
    Assistant,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier.
    pub id: MessageId,
    /// Turn author.
    pub role: TurnRole,
    /// Turn text.
    pub content: String,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a new turn.
    #[must_use]
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a turn authored by the social actor.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(TurnRole::User, content)
    }

    /// Creates a turn authored by the agent.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(TurnRole::Assistant, content)
    }
}
