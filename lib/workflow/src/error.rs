//! Error types for the workflow crate.
//!
//! Errors are layered:
//! - `GraphError`: structural problems with a graph (rejected at publication)
//! - `StoreError`: persistence failures and optimistic version conflicts
//! - `CollaboratorError`: an external system could not answer
//! - `ExecutionError`: failures surfaced by the executor to its caller
//!
//! Per-run failures (send exhaustion, unknown predicates) are not errors at
//! this level; they are recorded on the run as an `AbortReason`.

use crate::node::NodeId;
use creator_flow_core::{SubscriberId, WorkflowId, WorkflowRunId};
use std::fmt;

/// Errors from graph construction and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Node with the given ID was not found in the graph.
    NodeNotFound { node_id: NodeId },
    /// A node with this ID already exists.
    DuplicateNode { node_id: NodeId },
    /// The graph has no Trigger node.
    MissingTrigger,
    /// The graph has more than one Trigger node.
    MultipleTriggers { count: usize },
    /// Graph contains cycles.
    CycleDetected,
    /// A non-Trigger node has no inbound edge.
    Unreachable { node_id: NodeId },
    /// A Trigger node has an inbound edge.
    TriggerHasInbound { node_id: NodeId },
    /// A Condition node does not have exactly one `yes` and one `no` edge.
    InvalidBranchArity { node_id: NodeId, outbound: usize },
    /// A non-Condition node has more than one outbound edge.
    AmbiguousSuccessor { node_id: NodeId, outbound: usize },
    /// A Delay node waits longer than the supported maximum.
    DelayOutOfRange { node_id: NodeId, max_days: i64 },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::DuplicateNode { node_id } => write!(f, "duplicate node: {node_id}"),
            Self::MissingTrigger => write!(f, "graph has no trigger node"),
            Self::MultipleTriggers { count } => {
                write!(f, "graph has {count} trigger nodes, expected exactly one")
            }
            Self::CycleDetected => write!(f, "graph contains cycles"),
            Self::Unreachable { node_id } => {
                write!(f, "node {node_id} has no inbound edge")
            }
            Self::TriggerHasInbound { node_id } => {
                write!(f, "trigger node {node_id} has an inbound edge")
            }
            Self::InvalidBranchArity { node_id, outbound } => write!(
                f,
                "condition node {node_id} has {outbound} outbound edges, expected distinct yes/no branches"
            ),
            Self::AmbiguousSuccessor { node_id, outbound } => write!(
                f,
                "node {node_id} has {outbound} outbound edges, expected at most one"
            ),
            Self::DelayOutOfRange { node_id, max_days } => {
                write!(f, "delay node {node_id} exceeds the {max_days} day maximum")
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Errors from graph and run stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A published workflow was not found.
    WorkflowNotFound { workflow_id: WorkflowId },
    /// A run was not found.
    RunNotFound { run_id: WorkflowRunId },
    /// A write raced with another writer.
    VersionConflict { expected: u64, found: u64 },
    /// A non-terminal run already exists for this (graph, subscriber) pair.
    LiveRunExists { run_id: WorkflowRunId },
    /// A subscriber was not found.
    SubscriberNotFound { subscriber_id: SubscriberId },
    /// A workflow offered for storage failed graph validation.
    InvalidGraph {
        workflow_id: WorkflowId,
        source: GraphError,
    },
    /// The backing store failed.
    StorageFailed { reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkflowNotFound { workflow_id } => {
                write!(f, "workflow not found: {workflow_id}")
            }
            Self::RunNotFound { run_id } => write!(f, "run not found: {run_id}"),
            Self::VersionConflict { expected, found } => {
                write!(f, "version conflict: expected {expected}, found {found}")
            }
            Self::LiveRunExists { run_id } => write!(f, "live run already exists: {run_id}"),
            Self::SubscriberNotFound { subscriber_id } => {
                write!(f, "subscriber not found: {subscriber_id}")
            }
            Self::InvalidGraph {
                workflow_id,
                source,
            } => write!(f, "invalid graph for workflow {workflow_id}: {source}"),
            Self::StorageFailed { reason } => write!(f, "storage failed: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A failure reported by an external collaborator (engagement, catalog).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The collaborator could not answer right now.
    Unavailable { reason: String },
}

impl fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => write!(f, "collaborator unavailable: {reason}"),
        }
    }
}

impl std::error::Error for CollaboratorError {}

/// Errors returned by executor operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The run's graph failed validation or is missing a referenced node.
    InvalidGraph { workflow_id: WorkflowId, reason: String },
    /// A store operation failed.
    Store(StoreError),
    /// An external collaborator failed; the run stays where it is.
    Collaborator(CollaboratorError),
    /// The run is already terminal.
    AlreadyTerminal { run_id: WorkflowRunId },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidGraph {
                workflow_id,
                reason,
            } => write!(f, "invalid graph for workflow {workflow_id}: {reason}"),
            Self::Store(err) => write!(f, "store error: {err}"),
            Self::Collaborator(err) => write!(f, "{err}"),
            Self::AlreadyTerminal { run_id } => write!(f, "run {run_id} is already terminal"),
        }
    }
}

impl std::error::Error for ExecutionError {}

impl From<StoreError> for ExecutionError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<CollaboratorError> for ExecutionError {
    fn from(err: CollaboratorError) -> Self {
        Self::Collaborator(err)
    }
}
