//! Core domain types and utilities for the creator-flow automation engine.
//!
//! This crate provides the identifiers, error alias and template rendering
//! shared by the automation, conversation, workflow and scheduler crates.

pub mod delivery;
pub mod error;
pub mod id;
pub mod storefront;
pub mod template;

pub use delivery::SendError;
pub use error::Result;
pub use id::{
    AutomationId, CreatorId, KeywordId, MessageId, ParseIdError, SubscriberId, WorkflowId,
    WorkflowRunId,
};
pub use storefront::{FixedStorefronts, Storefronts};
pub use template::{TemplateVars, first_name_from_email, render};
