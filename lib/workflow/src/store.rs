//! Persistence traits for published graphs and runs.
//!
//! Any key-addressed record store with per-entity versioning can back these.
//! In-memory implementations live in [`crate::memory`].

use crate::definition::PublishedWorkflow;
use crate::error::StoreError;
use crate::execution::WorkflowRun;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use creator_flow_core::{CreatorId, WorkflowId, WorkflowRunId};
use std::sync::Arc;

/// Storage for published workflow versions.
///
/// Versions are append-only: replacing a workflow adds a new version and
/// leaves earlier ones readable, so runs enrolled on them keep executing.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Stores version 1 of a newly published workflow.
    ///
    /// Fails with `InvalidGraph` if the graph doesn't validate.
    async fn publish(&self, workflow: PublishedWorkflow) -> Result<(), StoreError>;

    /// Stores the next version of an existing workflow.
    ///
    /// Fails with `InvalidGraph` if the graph doesn't validate, and with
    /// `VersionConflict` unless `workflow.version` is exactly one past the
    /// latest stored version.
    async fn replace(&self, workflow: PublishedWorkflow) -> Result<(), StoreError>;

    /// Returns the latest version of a workflow.
    async fn latest(&self, workflow_id: WorkflowId)
    -> Result<Arc<PublishedWorkflow>, StoreError>;

    /// Returns a specific version of a workflow.
    async fn get_version(
        &self,
        workflow_id: WorkflowId,
        version: u32,
    ) -> Result<Arc<PublishedWorkflow>, StoreError>;

    /// Returns the latest version of every workflow owned by a creator.
    async fn list_for_creator(
        &self,
        creator_id: CreatorId,
    ) -> Result<Vec<Arc<PublishedWorkflow>>, StoreError>;
}

/// Storage for workflow runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Inserts a run unless its (workflow, subscriber) pair already has a live one.
    ///
    /// Returns the stored run, or `LiveRunExists` naming the existing run.
    async fn insert_if_no_live(&self, run: WorkflowRun) -> Result<WorkflowRun, StoreError>;

    /// Loads a run.
    async fn get(&self, run_id: WorkflowRunId) -> Result<WorkflowRun, StoreError>;

    /// Writes a run if the stored version still equals `run.version`.
    ///
    /// Returns the stored copy with its version bumped.
    async fn update(&self, run: &WorkflowRun) -> Result<WorkflowRun, StoreError>;

    /// Returns up to `limit` runs with work to do at `now`.
    ///
    /// That is every `Suspended` run whose wake time has passed, plus every
    /// `Running` run without a live claim (a pending send retry, or a run
    /// whose driver stopped). A run mid-send on another worker is left out.
    async fn due_runs(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<WorkflowRunId>, StoreError>;

    /// Returns every run of a workflow, across all versions.
    async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowRun>, StoreError>;
}
