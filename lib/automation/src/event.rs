//! Inbound social events and outbound replies.

use crate::automation::TriggerType;
use chrono::{DateTime, Utc};
use creator_flow_core::CreatorId;
use serde::{Deserialize, Serialize};

/// A comment or direct message on a creator's connected social account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// The creator whose account received the event.
    pub creator_id: CreatorId,
    pub event_type: TriggerType,
    /// The post commented on. Direct messages usually have none.
    pub post_id: Option<String>,
    pub text: String,
    /// Platform identifier of the commenter or sender.
    pub actor_id: String,
    /// Display name, when the platform supplies one.
    pub actor_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Creates a comment event.
    #[must_use]
    pub fn comment(
        creator_id: CreatorId,
        post_id: impl Into<String>,
        text: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            creator_id,
            event_type: TriggerType::Comment,
            post_id: Some(post_id.into()),
            text: text.into(),
            actor_id: actor_id.into(),
            actor_name: None,
            occurred_at: Utc::now(),
        }
    }

    /// Creates a direct message event.
    #[must_use]
    pub fn direct_message(
        creator_id: CreatorId,
        text: impl Into<String>,
        actor_id: impl Into<String>,
    ) -> Self {
        Self {
            creator_id,
            event_type: TriggerType::DirectMessage,
            post_id: None,
            text: text.into(),
            actor_id: actor_id.into(),
            actor_name: None,
            occurred_at: Utc::now(),
        }
    }

    /// Sets the actor's display name.
    #[must_use]
    pub fn with_actor_name(mut self, name: impl Into<String>) -> Self {
        self.actor_name = Some(name.into());
        self
    }
}

/// A reply ready for the messaging collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: TriggerType,
    /// The actor being replied to.
    pub recipient: String,
    pub rendered_text: String,
}

impl OutboundMessage {
    /// Creates a direct message to an actor.
    #[must_use]
    pub fn direct(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: TriggerType::DirectMessage,
            recipient: recipient.into(),
            rendered_text: text.into(),
        }
    }

    /// Creates a public comment reply.
    #[must_use]
    pub fn comment(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: TriggerType::Comment,
            recipient: recipient.into(),
            rendered_text: text.into(),
        }
    }
}
