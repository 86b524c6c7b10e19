//! Workflow definition types.
//!
//! A workflow starts life as a `WorkflowDraft` (typically produced by the
//! generator) and becomes a `PublishedWorkflow` by passing validation at
//! [`WorkflowDraft::publish`]. Published graphs are immutable; edits replace
//! the whole graph under a new version.

use crate::error::GraphError;
use crate::graph::WorkflowGraph;
use chrono::{DateTime, Utc};
use creator_flow_core::{CreatorId, WorkflowId};
use serde::{Deserialize, Serialize};

/// The family a workflow belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowKind {
    /// Greets new leads.
    Welcome,
    /// Follows up after a purchase.
    PurchaseFollowUp,
    /// Onboards course students.
    CourseOnboarding,
    /// Re-engages inactive subscribers.
    WinBack,
    /// Built by hand in the editor.
    Custom,
}

/// An unpublished workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDraft {
    /// Stable key within a generated set (e.g. `welcome`, `course-beat-lab`).
    pub key: String,
    /// Human-readable name.
    pub name: String,
    /// Description of what this workflow does.
    pub description: String,
    /// Workflow family.
    pub kind: WorkflowKind,
    /// The workflow graph (nodes and edges).
    pub graph: WorkflowGraph,
}

impl WorkflowDraft {
    /// Validates the draft and publishes it as version 1 of a new workflow.
    ///
    /// # Errors
    ///
    /// Returns the graph's validation error; nothing is published.
    pub fn publish(
        self,
        creator_id: CreatorId,
        now: DateTime<Utc>,
    ) -> Result<PublishedWorkflow, GraphError> {
        self.graph.validate()?;
        Ok(PublishedWorkflow {
            id: WorkflowId::new(),
            creator_id,
            name: self.name,
            description: self.description,
            kind: self.kind,
            version: 1,
            graph: self.graph,
            published_at: now,
        })
    }
}

/// A validated, immutable workflow version.
///
/// Deserializing re-validates the graph, so a stored record that no longer
/// passes validation fails to load.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PublishedRecord")]
pub struct PublishedWorkflow {
    /// Identifier shared by every version of this workflow.
    pub id: WorkflowId,
    /// The owning creator.
    pub creator_id: CreatorId,
    /// Human-readable name.
    pub name: String,
    /// Description of what this workflow does.
    pub description: String,
    /// Workflow family.
    pub kind: WorkflowKind,
    /// Version number, starting at 1.
    pub version: u32,
    /// The validated graph.
    pub graph: WorkflowGraph,
    /// When this version was published.
    pub published_at: DateTime<Utc>,
}

impl PublishedWorkflow {
    /// Builds the next version of this workflow with a replacement graph.
    ///
    /// # Errors
    ///
    /// Returns the replacement graph's validation error.
    pub fn replaced_with(
        &self,
        graph: WorkflowGraph,
        now: DateTime<Utc>,
    ) -> Result<Self, GraphError> {
        graph.validate()?;
        Ok(Self {
            version: self.version + 1,
            graph,
            published_at: now,
            ..self.clone()
        })
    }
}

/// Unvalidated wire form of a [`PublishedWorkflow`].
#[derive(Deserialize)]
struct PublishedRecord {
    id: WorkflowId,
    creator_id: CreatorId,
    name: String,
    description: String,
    kind: WorkflowKind,
    version: u32,
    graph: WorkflowGraph,
    published_at: DateTime<Utc>,
}

impl TryFrom<PublishedRecord> for PublishedWorkflow {
    type Error = GraphError;

    fn try_from(record: PublishedRecord) -> Result<Self, Self::Error> {
        record.graph.validate()?;
        Ok(Self {
            id: record.id,
            creator_id: record.creator_id,
            name: record.name,
            description: record.description,
            kind: record.kind,
            version: record.version,
            graph: record.graph,
            published_at: record.published_at,
        })
    }
}
