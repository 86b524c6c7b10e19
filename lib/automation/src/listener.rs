//! Listener strategies.

use crate::automation::TriggerType;
use crate::error::AutomationError;
use serde::{Deserialize, Serialize};

/// How an automation responds once it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Listener {
    /// Reply with a fixed template.
    StaticMessage {
        /// Direct message sent to the actor.
        message: String,
        /// Optional public reply under the comment. Only used for comment events.
        comment_reply: Option<String>,
    },
    /// Hand the exchange to a conversational agent. Tier-gated.
    Conversational {
        /// System prompt steering the agent.
        system_prompt: String,
    },
}

impl Listener {
    /// Creates a static message listener.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::StaticMessage {
            message: message.into(),
            comment_reply: None,
        }
    }

    /// Creates a static message listener that also replies publicly to comments.
    #[must_use]
    pub fn message_with_comment_reply(
        message: impl Into<String>,
        comment_reply: impl Into<String>,
    ) -> Self {
        Self::StaticMessage {
            message: message.into(),
            comment_reply: Some(comment_reply.into()),
        }
    }

    /// Creates a conversational listener.
    #[must_use]
    pub fn conversational(system_prompt: impl Into<String>) -> Self {
        Self::Conversational {
            system_prompt: system_prompt.into(),
        }
    }

    /// Returns true for the tier-gated conversational variant.
    #[must_use]
    pub fn is_conversational(&self) -> bool {
        matches!(self, Self::Conversational { .. })
    }

    pub(crate) fn validate(&self) -> Result<(), AutomationError> {
        match self {
            Self::StaticMessage { message, .. } if message.trim().is_empty() => {
                Err(AutomationError::EmptyListener { field: "message" })
            }
            Self::Conversational { system_prompt } if system_prompt.trim().is_empty() => {
                Err(AutomationError::EmptyListener {
                    field: "system_prompt",
                })
            }
            _ => Ok(()),
        }
    }
}

/// Replies sent per channel, for the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCounters {
    pub dm_count: u64,
    pub comment_count: u64,
}

impl ResponseCounters {
    /// Counts one reply delivered on the given channel.
    pub fn record(&mut self, channel: TriggerType) {
        match channel {
            TriggerType::DirectMessage => self.dm_count += 1,
            TriggerType::Comment => self.comment_count += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_templates_are_rejected() {
        assert!(Listener::message("  ").validate().is_err());
        assert!(Listener::conversational("").validate().is_err());
        assert!(Listener::message("Here you go").validate().is_ok());
    }

    #[test]
    fn counters_track_each_channel() {
        let mut counters = ResponseCounters::default();
        counters.record(TriggerType::DirectMessage);
        counters.record(TriggerType::DirectMessage);
        counters.record(TriggerType::Comment);
        assert_eq!(counters.dm_count, 2);
        assert_eq!(counters.comment_count, 1);
    }

    #[test]
    fn listener_serializes_with_type_tag() {
        let json = serde_json::to_value(Listener::conversational("Be helpful")).expect("serialize");
        assert_eq!(json["type"], "conversational");
        assert_eq!(json["system_prompt"], "Be helpful");
    }
}
