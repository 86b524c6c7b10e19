//! Email automation workflows for creator-flow.
//!
//! This crate provides the workflow side of the engine:
//!
//! - **Graph Model**: Directed acyclic graphs using petgraph with typed nodes and labeled edges
//! - **Node Types**: Trigger, Email, Delay, Condition, Action
//! - **Publication**: Validated, versioned workflow definitions
//! - **Generation**: Default workflow sets derived from a creator's catalog and tone
//! - **Execution**: Per-subscriber runs moved through the graph under optimistic versioning

pub mod definition;
pub mod edge;
pub mod error;
pub mod execution;
pub mod executor;
pub mod generator;
pub mod graph;
pub mod memory;
pub mod node;
pub mod services;
pub mod store;
pub mod tone;

pub use definition::{PublishedWorkflow, WorkflowDraft, WorkflowKind};
pub use edge::{Edge, EdgeRef};
pub use error::{CollaboratorError, ExecutionError, GraphError, StoreError};
pub use execution::{AbortReason, RunState, RunSummary, StepRecord, WorkflowRun};
pub use executor::{
    Collaborators, Enrollment, Executor, ExecutorConfig, ResumeOutcome, StepOutcome,
};
pub use generator::{CreatorContext, generate};
pub use graph::{GraphDocument, WorkflowGraph};
pub use node::{EnrollmentEvent, EnrollmentTrigger, Node, NodeId, NodeKind, NodeType};
pub use services::{
    CatalogSummary, EmailSender, EngagementQuery, OutboundEmail, SubscriberProfile,
    SubscriberStore,
};
pub use store::{GraphStore, RunStore};
pub use tone::Tone;
