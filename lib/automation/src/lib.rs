//! Keyword automations for creator-flow.
//!
//! This crate handles inbound social events:
//!
//! - **Automations**: trigger types, keywords, post scope and listener per creator
//! - **Matching**: pure keyword/scope/event-type evaluation
//! - **Resolution**: static templated replies or tier-gated conversational handoffs
//! - **Dispatch**: match policy, bounded delivery retry and response counters

pub mod automation;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod listener;
pub mod matcher;
pub mod memory;
pub mod resolver;
pub mod service;
pub mod store;

pub use automation::{Automation, Keyword, Scope, TriggerType};
pub use dispatch::{
    ConversationAgent, DispatchConfig, DispatchOutcome, DispatchReport, DispatchResult,
    Dispatcher, MessageDispatch,
};
pub use error::{AgentError, AutomationError, DispatchError, ResolveError};
pub use event::{InboundEvent, OutboundMessage};
pub use listener::{Listener, ResponseCounters};
pub use matcher::{DEFAULT_MATCH_POLICY, Match, MatchPolicy, match_event};
pub use resolver::{CapabilityCheck, ConversationHandoff, ListenerResolver, ReplyPlan};
pub use service::AutomationService;
pub use store::AutomationStore;
