//! Conversation history store.
//!
//! History is scoped by the (automation, actor) pair: the same social actor
//! talking to two different conversational automations has two independent
//! histories. Retrieval is windowed to keep the handoff to the agent bounded.

use crate::error::HistoryError;
use crate::message::Turn;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creator_flow_core::AutomationId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Default number of prior turns handed to a conversational agent.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Scope key for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    /// The automation whose listener is conversing.
    pub automation_id: AutomationId,
    /// The social platform identifier of the other party.
    pub actor_id: String,
}

impl ConversationKey {
    /// Creates a new conversation key.
    #[must_use]
    pub fn new(automation_id: AutomationId, actor_id: impl Into<String>) -> Self {
        Self {
            automation_id,
            actor_id: actor_id.into(),
        }
    }
}

/// Trait for conversation history storage.
#[async_trait]
pub trait ConversationHistory: Send + Sync {
    /// Appends a turn to the conversation.
    async fn append(&self, key: &ConversationKey, turn: Turn) -> Result<(), HistoryError>;

    /// Returns the last `limit` turns, oldest first.
    async fn recent(&self, key: &ConversationKey, limit: usize) -> Result<Vec<Turn>, HistoryError>;

    /// Returns every automation this actor has talked to, most recently active first.
    async fn conversations_for_actor(
        &self,
        actor_id: &str,
    ) -> Result<Vec<(AutomationId, DateTime<Utc>)>, HistoryError>;
}

/// In-memory history store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConversationHistory {
    turns: Arc<RwLock<HashMap<ConversationKey, Vec<Turn>>>>,
}

impl InMemoryConversationHistory {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> HistoryError {
    HistoryError::StorageFailed {
        reason: "history lock poisoned".to_string(),
    }
}

#[async_trait]
impl ConversationHistory for InMemoryConversationHistory {
    async fn append(&self, key: &ConversationKey, turn: Turn) -> Result<(), HistoryError> {
        if turn.content.trim().is_empty() {
            return Err(HistoryError::InvalidTurn {
                reason: "turn content is empty".to_string(),
            });
        }
        let mut turns = self.turns.write().map_err(|_| poisoned())?;
        turns.entry(key.clone()).or_default().push(turn);
        Ok(())
    }

    async fn recent(&self, key: &ConversationKey, limit: usize) -> Result<Vec<Turn>, HistoryError> {
        let turns = self.turns.read().map_err(|_| poisoned())?;
        let Some(all) = turns.get(key) else {
            return Ok(Vec::new());
        };
        let skip = all.len().saturating_sub(limit);
        Ok(all[skip..].to_vec())
    }

    async fn conversations_for_actor(
        &self,
        actor_id: &str,
    ) -> Result<Vec<(AutomationId, DateTime<Utc>)>, HistoryError> {
        let turns = self.turns.read().map_err(|_| poisoned())?;
        let mut found: Vec<(AutomationId, DateTime<Utc>)> = turns
            .iter()
            .filter(|(key, _)| key.actor_id == actor_id)
            .filter_map(|(key, turns)| turns.last().map(|t| (key.automation_id, t.timestamp)))
            .collect();
        found.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recent_returns_window_oldest_first() {
        let store = InMemoryConversationHistory::new();
        let key = ConversationKey::new(AutomationId::new(), "actor-1");

        for i in 0..12 {
            store
                .append(&key, Turn::user(format!("message {i}")))
                .await
                .expect("append");
        }

        let recent = store.recent(&key, DEFAULT_HISTORY_LIMIT).await.expect("recent");
        assert_eq!(recent.len(), 10);
        assert_eq!(recent[0].content, "message 2");
        assert_eq!(recent[9].content, "message 11");
    }

    #[tokio::test]
    async fn histories_are_scoped_per_automation() {
        let store = InMemoryConversationHistory::new();
        let a = ConversationKey::new(AutomationId::new(), "actor-1");
        let b = ConversationKey::new(AutomationId::new(), "actor-1");

        store.append(&a, Turn::user("to a")).await.expect("append");

        assert_eq!(store.recent(&a, 10).await.expect("recent").len(), 1);
        assert!(store.recent(&b, 10).await.expect("recent").is_empty());
    }

    #[tokio::test]
    async fn empty_turns_are_rejected() {
        let store = InMemoryConversationHistory::new();
        let key = ConversationKey::new(AutomationId::new(), "actor-1");
        let result = store.append(&key, Turn::user("   ")).await;
        assert!(matches!(result, Err(HistoryError::InvalidTurn { .. })));
    }

    #[tokio::test]
    async fn conversations_for_actor_lists_only_that_actor() {
        let store = InMemoryConversationHistory::new();
        let automation = AutomationId::new();
        store
            .append(&ConversationKey::new(automation, "actor-1"), Turn::user("hi"))
            .await
            .expect("append");
        store
            .append(&ConversationKey::new(AutomationId::new(), "actor-2"), Turn::user("yo"))
            .await
            .expect("append");

        let found = store.conversations_for_actor("actor-1").await.expect("list");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, automation);
    }
}
