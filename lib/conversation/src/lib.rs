//! Conversation history for the creator-flow automation engine.
//!
//! Conversational listeners hand an inbound direct message to an external
//! agent together with the prior turns exchanged between that automation and
//! that social actor. This crate provides:
//!
//! - **Turns**: role-tagged messages with timestamps
//! - **History Store**: append and windowed retrieval scoped by (automation, actor)

pub mod error;
pub mod history;
pub mod message;

pub use error::HistoryError;
pub use history::{
    ConversationHistory, ConversationKey, DEFAULT_HISTORY_LIMIT, InMemoryConversationHistory,
};
pub use message::{Turn, TurnRole};
