//! The workflow executor.
//!
//! The executor moves runs through their graphs one node at a time. Each
//! transition is a read-modify-write of the run record, guarded by the run's
//! optimistic version: if another worker moved the run first, the write
//! fails with a version conflict and this attempt is reported as `Skipped`.
//!
//! Delivery is at-least-once. Before an Email or Action node's side effect,
//! the executor persists a claim on that node with a lease. While the lease
//! is live no other worker executes the node. A crash between the side
//! effect and the advancing write leaves the claim to expire, after which
//! the node re-runs rather than being skipped.

use crate::definition::PublishedWorkflow;
use crate::edge::{NO, YES};
use crate::error::{ExecutionError, StoreError};
use crate::execution::{AbortReason, RunState, RunSummary, WorkflowRun};
use crate::node::{
    ActionNode, EmailNode, EnrollmentEvent, Node, NodeId, NodeKind, NodeType, Predicate,
    TagOperation,
};
use crate::services::{EmailSender, EngagementQuery, OutboundEmail, SubscriberStore};
use crate::store::{GraphStore, RunStore};
use chrono::{DateTime, Duration, Utc};
use creator_flow_core::{
    CreatorId, Storefronts, SubscriberId, TemplateVars, WorkflowId, WorkflowRunId,
    first_name_from_email, render,
};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Default number of send attempts per Email node before aborting.
pub const DEFAULT_MAX_SEND_ATTEMPTS: u32 = 3;

/// Default number of nodes a run may complete.
pub const DEFAULT_MAX_STEPS: u32 = 256;

/// Default lifetime of a claim on a node's side effect.
pub const DEFAULT_CLAIM_LEASE_SECONDS: u32 = 300;

/// Executor settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Send attempts per Email node before the run aborts with `SendFailure`.
    pub max_send_attempts: u32,
    /// Nodes a run may complete before it aborts with `StepBudgetExhausted`.
    pub max_steps: u32,
    /// How long a worker's claim on a send or tag change blocks other workers.
    pub claim_lease_seconds: u32,
}

impl ExecutorConfig {
    fn claim_lease(&self) -> Duration {
        Duration::seconds(i64::from(self.claim_lease_seconds))
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_send_attempts: DEFAULT_MAX_SEND_ATTEMPTS,
            max_steps: DEFAULT_MAX_STEPS,
            claim_lease_seconds: DEFAULT_CLAIM_LEASE_SECONDS,
        }
    }
}

/// The external systems the executor talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub subscribers: Arc<dyn SubscriberStore>,
    pub email: Arc<dyn EmailSender>,
    pub engagement: Arc<dyn EngagementQuery>,
    pub storefronts: Arc<dyn Storefronts>,
}

/// Result of executing the node a run points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The node completed and the run moved to its successor.
    Advanced,
    /// The node completed and it had no successor.
    Completed,
    /// The run is now waiting at a Delay node.
    Suspended { wake_at: DateTime<Utc> },
    /// A send failed transiently; the run stays at the node for the next pass.
    RetryScheduled { attempts: u32 },
    /// The run was aborted.
    Aborted(AbortReason),
    /// The run is suspended or terminal; there was nothing to execute.
    Idle,
    /// Another worker changed the run first, or holds a live claim on it.
    Skipped,
}

/// Result of resuming a suspended run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// The delay completed and the run moved on by exactly one node.
    Advanced,
    /// The wake time has not passed yet.
    NotDue,
    /// The run is not suspended.
    NotSuspended,
    /// Another worker resumed the run first.
    Skipped,
}

impl ResumeOutcome {
    /// Returns true if this call changed nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        !matches!(self, Self::Advanced)
    }
}

/// Result of an enrollment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enrollment {
    /// A fresh run was created and driven until it waited or finished.
    Started {
        run_id: WorkflowRunId,
        outcome: StepOutcome,
    },
    /// The pair already has a live run; nothing changed.
    AlreadyLive { run_id: WorkflowRunId },
}

/// Executes workflow runs.
#[derive(Clone)]
pub struct Executor {
    graphs: Arc<dyn GraphStore>,
    runs: Arc<dyn RunStore>,
    collaborators: Collaborators,
    config: ExecutorConfig,
}

impl Executor {
    /// Creates a new executor.
    #[must_use]
    pub fn new(
        graphs: Arc<dyn GraphStore>,
        runs: Arc<dyn RunStore>,
        collaborators: Collaborators,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            graphs,
            runs,
            collaborators,
            config,
        }
    }

    /// Returns the executor's settings.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Returns the run store.
    #[must_use]
    pub fn runs(&self) -> &Arc<dyn RunStore> {
        &self.runs
    }

    /// Enrolls a subscriber into the latest version of a workflow.
    ///
    /// A pair with a live run is left alone. A pair whose previous run
    /// completed or aborted gets a fresh run. New runs are driven until they
    /// reach a delay or finish.
    #[instrument(skip(self), fields(workflow_id = %workflow_id, subscriber_id = %subscriber_id))]
    pub async fn enroll(
        &self,
        workflow_id: WorkflowId,
        subscriber_id: SubscriberId,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, Report<ExecutionError>> {
        let workflow = self
            .graphs
            .latest(workflow_id)
            .await
            .map_err(ExecutionError::from)?;
        self.enroll_into(&workflow, subscriber_id, now).await
    }

    async fn enroll_into(
        &self,
        workflow: &PublishedWorkflow,
        subscriber_id: SubscriberId,
        now: DateTime<Utc>,
    ) -> Result<Enrollment, Report<ExecutionError>> {
        let entry = workflow
            .graph
            .trigger_node()
            .ok_or_else(|| ExecutionError::InvalidGraph {
                workflow_id: workflow.id,
                reason: "no trigger node".to_string(),
            })?;

        let run = WorkflowRun::new(
            workflow.id,
            workflow.version,
            workflow.creator_id,
            subscriber_id,
            entry.id.clone(),
            now,
        );

        match self.runs.insert_if_no_live(run).await {
            Ok(run) => {
                info!(run_id = %run.id, version = workflow.version, "Enrolled subscriber");
                let outcome = self.drive(run.id, now).await?;
                Ok(Enrollment::Started {
                    run_id: run.id,
                    outcome,
                })
            }
            Err(StoreError::LiveRunExists { run_id }) => {
                debug!(run_id = %run_id, "Subscriber already has a live run");
                Ok(Enrollment::AlreadyLive { run_id })
            }
            Err(e) => Err(ExecutionError::from(e).into()),
        }
    }

    /// Enrolls a subscriber into every workflow of the creator whose trigger matches.
    #[instrument(skip(self, event), fields(creator_id = %creator_id, subscriber_id = %subscriber_id))]
    pub async fn enroll_matching(
        &self,
        creator_id: CreatorId,
        event: &EnrollmentEvent,
        subscriber_id: SubscriberId,
        now: DateTime<Utc>,
    ) -> Result<Vec<(WorkflowId, Enrollment)>, Report<ExecutionError>> {
        let workflows = self
            .graphs
            .list_for_creator(creator_id)
            .await
            .map_err(ExecutionError::from)?;

        let mut enrollments = Vec::new();
        for workflow in workflows {
            let matches = workflow
                .graph
                .enrollment_trigger()
                .is_some_and(|trigger| trigger.matches(event));
            if matches {
                let enrollment = self.enroll_into(&workflow, subscriber_id, now).await?;
                enrollments.push((workflow.id, enrollment));
            }
        }
        Ok(enrollments)
    }

    /// Resumes a suspended run whose wake time has passed.
    ///
    /// Completes the Delay node and moves the run to its successor (or
    /// completes it). This is a single guarded transition: two concurrent
    /// resumes of the same run produce exactly one `Advanced`.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn resume(
        &self,
        run_id: WorkflowRunId,
        now: DateTime<Utc>,
    ) -> Result<ResumeOutcome, Report<ExecutionError>> {
        let mut run = self.runs.get(run_id).await.map_err(ExecutionError::from)?;
        let RunState::Suspended { node, wake_at } = run.state.clone() else {
            return Ok(ResumeOutcome::NotSuspended);
        };
        if wake_at > now {
            return Ok(ResumeOutcome::NotDue);
        }

        let workflow = self.workflow_for(&run).await?;
        let next = workflow.graph.next(&node).map(|n| n.id.clone());
        run.complete_step(node, NodeType::Delay, next, now);

        match self.write(&run).await? {
            Some(_) => {
                debug!("Resumed run");
                Ok(ResumeOutcome::Advanced)
            }
            None => Ok(ResumeOutcome::Skipped),
        }
    }

    /// Steps a run until it waits, finishes, or is skipped.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn drive(
        &self,
        run_id: WorkflowRunId,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, Report<ExecutionError>> {
        loop {
            match self.step(run_id, now).await? {
                StepOutcome::Advanced => continue,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Executes the node the run currently points at.
    pub async fn step(
        &self,
        run_id: WorkflowRunId,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, Report<ExecutionError>> {
        let mut run = self.runs.get(run_id).await.map_err(ExecutionError::from)?;
        let RunState::Running { node: node_id } = run.state.clone() else {
            return Ok(StepOutcome::Idle);
        };
        if run.is_claimed_at(now) {
            debug!(run_id = %run.id, node_id = %node_id, "Node claimed by another worker, skipping");
            return Ok(StepOutcome::Skipped);
        }

        if run.steps_taken >= self.config.max_steps {
            let reason = AbortReason::StepBudgetExhausted {
                steps: run.steps_taken,
            };
            return self.abort(run, reason, now).await;
        }

        let workflow = self.workflow_for(&run).await?;
        let Some(node) = workflow.graph.get_node(&node_id) else {
            let reason = AbortReason::InvalidGraph {
                detail: format!("node {node_id} not found"),
            };
            return self.abort(run, reason, now).await;
        };

        match &node.kind {
            NodeKind::Trigger(_) => {
                let next = workflow.graph.next(&node.id).map(|n| n.id.clone());
                self.advance(run, node, next, now).await
            }
            NodeKind::Email(email) => self.send_email(run, &workflow, node, email, now).await,
            NodeKind::Delay(delay) => {
                let Some(wake_at) = now.checked_add_signed(delay.duration()) else {
                    let reason = AbortReason::InvalidGraph {
                        detail: format!("delay at {} overflows the clock", node.id),
                    };
                    return self.abort(run, reason, now).await;
                };
                run.suspend(node.id.clone(), wake_at, now);
                Ok(match self.write(&run).await? {
                    Some(_) => StepOutcome::Suspended { wake_at },
                    None => StepOutcome::Skipped,
                })
            }
            NodeKind::Condition(condition) => {
                self.evaluate(run, &workflow, node, &condition.predicate, now)
                    .await
            }
            NodeKind::Action(action) => self.apply_action(run, &workflow, node, action, now).await,
        }
    }

    /// Moves a non-terminal run to `Aborted(UserCancelled)`.
    #[instrument(skip(self), fields(run_id = %run_id))]
    pub async fn cancel(
        &self,
        run_id: WorkflowRunId,
        now: DateTime<Utc>,
    ) -> Result<(), Report<ExecutionError>> {
        // An operator cancel should win over a concurrent step, so retry a
        // conflicted write against the fresh record.
        for _ in 0..3 {
            let mut run = self.runs.get(run_id).await.map_err(ExecutionError::from)?;
            if run.is_terminal() {
                return Err(ExecutionError::AlreadyTerminal { run_id }.into());
            }
            run.abort(AbortReason::UserCancelled, now);
            if self.write(&run).await?.is_some() {
                info!("Cancelled run");
                return Ok(());
            }
        }
        Err(ExecutionError::Store(StoreError::StorageFailed {
            reason: "run kept changing during cancellation".to_string(),
        })
        .into())
    }

    /// Returns aggregate run counts for a workflow.
    pub async fn summary(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<RunSummary, Report<ExecutionError>> {
        let runs = self
            .runs
            .list_for_workflow(workflow_id)
            .await
            .map_err(ExecutionError::from)?;
        Ok(RunSummary::from_runs(&runs))
    }

    async fn workflow_for(
        &self,
        run: &WorkflowRun,
    ) -> Result<Arc<PublishedWorkflow>, Report<ExecutionError>> {
        Ok(self
            .graphs
            .get_version(run.workflow_id, run.workflow_version)
            .await
            .map_err(ExecutionError::from)?)
    }

    /// Writes the run. `None` means the write lost a race.
    async fn write(
        &self,
        run: &WorkflowRun,
    ) -> Result<Option<WorkflowRun>, Report<ExecutionError>> {
        match self.runs.update(run).await {
            Ok(stored) => Ok(Some(stored)),
            Err(StoreError::VersionConflict { expected, found }) => {
                debug!(run_id = %run.id, expected, found, "Run changed concurrently, skipping");
                Ok(None)
            }
            Err(e) => Err(ExecutionError::from(e).into()),
        }
    }

    async fn advance(
        &self,
        mut run: WorkflowRun,
        node: &Node,
        next: Option<NodeId>,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, Report<ExecutionError>> {
        run.complete_step(node.id.clone(), node.node_type(), next, now);
        let completed = run.state == RunState::Completed;
        Ok(match self.write(&run).await? {
            Some(_) if completed => {
                info!(run_id = %run.id, "Run completed");
                StepOutcome::Completed
            }
            Some(_) => StepOutcome::Advanced,
            None => StepOutcome::Skipped,
        })
    }

    async fn abort(
        &self,
        mut run: WorkflowRun,
        reason: AbortReason,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, Report<ExecutionError>> {
        run.abort(reason.clone(), now);
        Ok(match self.write(&run).await? {
            Some(_) => {
                warn!(run_id = %run.id, reason = %reason, "Run aborted");
                StepOutcome::Aborted(reason)
            }
            None => StepOutcome::Skipped,
        })
    }

    /// Persists a leased claim on the current node before its side effect.
    async fn claim(
        &self,
        mut run: WorkflowRun,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowRun>, Report<ExecutionError>> {
        run.record_attempt(now, self.config.claim_lease());
        self.write(&run).await
    }

    /// Drops a claim after a failed side effect so the node can be retried.
    async fn release(
        &self,
        mut run: WorkflowRun,
        now: DateTime<Utc>,
    ) -> Result<Option<WorkflowRun>, Report<ExecutionError>> {
        run.release_claim(now);
        self.write(&run).await
    }

    async fn send_email(
        &self,
        run: WorkflowRun,
        workflow: &PublishedWorkflow,
        node: &Node,
        email: &EmailNode,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, Report<ExecutionError>> {
        let subscribers = &self.collaborators.subscribers;
        let suppressed = subscribers
            .is_suppressed(run.subscriber_id)
            .await
            .map_err(ExecutionError::from)?;
        if suppressed {
            let reason = AbortReason::Suppressed {
                node_id: node.id.clone(),
            };
            return self.abort(run, reason, now).await;
        }

        let profile = subscribers
            .profile(run.subscriber_id)
            .await
            .map_err(ExecutionError::from)?;
        let store_url = self
            .collaborators
            .storefronts
            .store_url(workflow.creator_id)
            .await;
        if store_url.is_none() {
            warn!(
                run_id = %run.id,
                creator_id = %workflow.creator_id,
                "No storefront URL for creator, leaving placeholder unrendered"
            );
        }
        let first_name = profile
            .first_name
            .clone()
            .unwrap_or_else(|| first_name_from_email(&profile.email).to_string());
        let vars = TemplateVars::subscriber(first_name, store_url);
        let outbound = OutboundEmail {
            recipient: profile.email,
            subject: render(&email.subject, &vars),
            body_html: render(&email.body, &vars),
        };

        let Some(claimed) = self.claim(run, now).await? else {
            return Ok(StepOutcome::Skipped);
        };

        match self.collaborators.email.send(&outbound).await {
            Ok(()) => {
                let next = workflow.graph.next(&node.id).map(|n| n.id.clone());
                self.advance(claimed, node, next, now).await
            }
            Err(e) if e.is_retryable() && claimed.attempts < self.config.max_send_attempts => {
                debug!(
                    run_id = %claimed.id,
                    node_id = %node.id,
                    attempts = claimed.attempts,
                    error = %e,
                    "Email send failed, will retry"
                );
                let attempts = claimed.attempts;
                Ok(match self.release(claimed, now).await? {
                    Some(_) => StepOutcome::RetryScheduled { attempts },
                    None => StepOutcome::Skipped,
                })
            }
            Err(e) => {
                let reason = AbortReason::SendFailure {
                    node_id: node.id.clone(),
                    detail: e.reason().to_string(),
                };
                self.abort(claimed, reason, now).await
            }
        }
    }

    async fn evaluate(
        &self,
        run: WorkflowRun,
        workflow: &PublishedWorkflow,
        node: &Node,
        predicate: &Predicate,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, Report<ExecutionError>> {
        let engagement = &self.collaborators.engagement;
        let holds = match predicate {
            Predicate::OpenedEmail { email } => engagement
                .opened_email(run.subscriber_id, run.workflow_id, email.as_ref())
                .await
                .map_err(ExecutionError::from)?,
            Predicate::ClickedLink { email } => engagement
                .clicked_link(run.subscriber_id, run.workflow_id, email.as_ref())
                .await
                .map_err(ExecutionError::from)?,
            Predicate::HasTag { tag } => self
                .collaborators
                .subscribers
                .tags(run.subscriber_id)
                .await
                .map_err(ExecutionError::from)?
                .iter()
                .any(|t| t.eq_ignore_ascii_case(tag)),
            Predicate::Unrecognized => {
                error!(
                    run_id = %run.id,
                    workflow_id = %run.workflow_id,
                    node_id = %node.id,
                    "Unknown predicate kind in condition node"
                );
                let reason = AbortReason::UnknownPredicate {
                    node_id: node.id.clone(),
                };
                return self.abort(run, reason, now).await;
            }
        };

        let handle = if holds { YES } else { NO };
        let Some(next) = workflow.graph.branch(&node.id, handle) else {
            let reason = AbortReason::InvalidGraph {
                detail: format!("condition {} has no {handle} branch", node.id),
            };
            return self.abort(run, reason, now).await;
        };
        debug!(run_id = %run.id, node_id = %node.id, branch = handle, "Condition evaluated");
        let next = Some(next.id.clone());
        self.advance(run, node, next, now).await
    }

    async fn apply_action(
        &self,
        run: WorkflowRun,
        workflow: &PublishedWorkflow,
        node: &Node,
        action: &ActionNode,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, Report<ExecutionError>> {
        let Some(claimed) = self.claim(run, now).await? else {
            return Ok(StepOutcome::Skipped);
        };

        let subscribers = &self.collaborators.subscribers;
        let subscriber_id = claimed.subscriber_id;
        let applied = match action.operation {
            TagOperation::AddTag => subscribers.add_tag(subscriber_id, &action.tag).await,
            TagOperation::RemoveTag => subscribers.remove_tag(subscriber_id, &action.tag).await,
        };
        if let Err(e) = applied {
            self.release(claimed, now).await?;
            return Err(ExecutionError::from(e).into());
        }

        let next = workflow.graph.next(&node.id).map(|n| n.id.clone());
        self.advance(claimed, node, next, now).await
    }
}
