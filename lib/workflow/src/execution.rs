//! Workflow run state machine.
//!
//! A run walks its graph one node at a time. The state tracks:
//! - Where the run is (`Running` at a node, or `Suspended` at a delay)
//! - How it ended (`Completed`, or `Aborted` with a reason)
//! - A step log of every completed node
//!
//! The methods here are pure state transitions. Persisting them, and guarding
//! them with the run's optimistic version, is the executor's job.

use crate::node::{NodeId, NodeType};
use chrono::{DateTime, Duration, Utc};
use creator_flow_core::{CreatorId, SubscriberId, WorkflowId, WorkflowRunId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Why a run was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbortReason {
    /// The email send failed terminally or exhausted its retries.
    SendFailure { node_id: NodeId, detail: String },
    /// A Condition node used a predicate kind this engine doesn't know.
    UnknownPredicate { node_id: NodeId },
    /// An operator cancelled the run.
    UserCancelled,
    /// The run exceeded its maximum step count.
    StepBudgetExhausted { steps: u32 },
    /// The recipient is unsubscribed or bounced.
    Suppressed { node_id: NodeId },
    /// The graph referenced a node or branch that doesn't exist.
    InvalidGraph { detail: String },
}

impl AbortReason {
    /// Returns a stable short name for aggregation.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SendFailure { .. } => "send_failure",
            Self::UnknownPredicate { .. } => "unknown_predicate",
            Self::UserCancelled => "user_cancelled",
            Self::StepBudgetExhausted { .. } => "step_budget_exhausted",
            Self::Suppressed { .. } => "suppressed",
            Self::InvalidGraph { .. } => "invalid_graph",
        }
    }
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailure { node_id, detail } => {
                write!(f, "send failed at {node_id}: {detail}")
            }
            Self::UnknownPredicate { node_id } => write!(f, "unknown predicate at {node_id}"),
            Self::UserCancelled => write!(f, "cancelled by operator"),
            Self::StepBudgetExhausted { steps } => write!(f, "step budget exhausted after {steps}"),
            Self::Suppressed { node_id } => write!(f, "recipient suppressed at {node_id}"),
            Self::InvalidGraph { detail } => write!(f, "invalid graph: {detail}"),
        }
    }
}

/// The state of a workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// The run will execute `node` next.
    Running { node: NodeId },
    /// The run is waiting at a Delay node until `wake_at`.
    Suspended { node: NodeId, wake_at: DateTime<Utc> },
    /// The run reached a node with no outbound edges.
    Completed,
    /// The run stopped early.
    Aborted { reason: AbortReason },
}

impl RunState {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted { .. })
    }

    /// Returns the current node pointer, if not terminal.
    #[must_use]
    pub fn node(&self) -> Option<&NodeId> {
        match self {
            Self::Running { node } | Self::Suspended { node, .. } => Some(node),
            Self::Completed | Self::Aborted { .. } => None,
        }
    }
}

/// A completed node in a run's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// The node that completed.
    pub node_id: NodeId,
    /// Its type.
    pub kind: NodeType,
    /// When it completed.
    pub completed_at: DateTime<Utc>,
}

/// One subscriber's execution of one workflow version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Unique identifier for this run.
    pub id: WorkflowRunId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The graph version this run was enrolled on.
    pub workflow_version: u32,
    /// The creator that owns the workflow.
    pub creator_id: CreatorId,
    /// The subscriber being walked through the workflow.
    pub subscriber_id: SubscriberId,
    /// Current state.
    pub state: RunState,
    /// The last node whose step completed.
    pub last_completed: Option<NodeId>,
    /// Send attempts made at the current node.
    pub attempts: u32,
    /// While in the future, a worker holds the current node's side effect.
    #[serde(default)]
    pub claimed_until: Option<DateTime<Utc>>,
    /// Nodes completed so far.
    pub steps_taken: u32,
    /// Completed nodes in order.
    pub step_log: Vec<StepRecord>,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: u64,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When the run was last written.
    pub updated_at: DateTime<Utc>,
    /// When the run reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    /// Creates a new run positioned at the graph's entry node.
    #[must_use]
    pub fn new(
        workflow_id: WorkflowId,
        workflow_version: u32,
        creator_id: CreatorId,
        subscriber_id: SubscriberId,
        entry: NodeId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: WorkflowRunId::new(),
            workflow_id,
            workflow_version,
            creator_id,
            subscriber_id,
            state: RunState::Running { node: entry },
            last_completed: None,
            attempts: 0,
            claimed_until: None,
            steps_taken: 0,
            step_log: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Returns true if the run is completed or aborted.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Records an attempt at the current node and claims it until `now + lease`.
    ///
    /// A claim that outlives its lease is treated as abandoned, so a worker
    /// that crashed mid-send doesn't strand the run.
    pub fn record_attempt(&mut self, now: DateTime<Utc>, lease: Duration) {
        self.attempts += 1;
        let until = now
            .checked_add_signed(lease)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.claimed_until = Some(until);
        self.updated_at = now;
    }

    /// Returns true if a worker holds a live claim on the current node.
    #[must_use]
    pub fn is_claimed_at(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }

    /// Drops the claim so the next pass may retry the node.
    pub fn release_claim(&mut self, now: DateTime<Utc>) {
        self.claimed_until = None;
        self.updated_at = now;
    }

    /// Completes the step at `node` and moves to `next`, or completes the run.
    pub fn complete_step(
        &mut self,
        node: NodeId,
        kind: NodeType,
        next: Option<NodeId>,
        now: DateTime<Utc>,
    ) {
        self.step_log.push(StepRecord {
            node_id: node.clone(),
            kind,
            completed_at: now,
        });
        self.last_completed = Some(node);
        self.steps_taken += 1;
        self.attempts = 0;
        self.claimed_until = None;
        self.updated_at = now;
        match next {
            Some(node) => self.state = RunState::Running { node },
            None => {
                self.state = RunState::Completed;
                self.finished_at = Some(now);
            }
        }
    }

    /// Suspends the run at a delay node.
    pub fn suspend(&mut self, node: NodeId, wake_at: DateTime<Utc>, now: DateTime<Utc>) {
        self.state = RunState::Suspended { node, wake_at };
        self.claimed_until = None;
        self.updated_at = now;
    }

    /// Aborts the run.
    pub fn abort(&mut self, reason: AbortReason, now: DateTime<Utc>) {
        self.state = RunState::Aborted { reason };
        self.claimed_until = None;
        self.updated_at = now;
        self.finished_at = Some(now);
    }
}

/// Aggregate run counts for one workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Runs ready to execute a node.
    pub running: usize,
    /// Runs waiting on a delay.
    pub suspended: usize,
    /// Runs that finished normally.
    pub completed: usize,
    /// Aborted runs keyed by `AbortReason::kind`.
    pub aborted: BTreeMap<String, usize>,
}

impl RunSummary {
    /// Tallies a set of runs.
    #[must_use]
    pub fn from_runs<'a>(runs: impl IntoIterator<Item = &'a WorkflowRun>) -> Self {
        let mut summary = Self::default();
        for run in runs {
            match &run.state {
                RunState::Running { .. } => summary.running += 1,
                RunState::Suspended { .. } => summary.suspended += 1,
                RunState::Completed => summary.completed += 1,
                RunState::Aborted { reason } => {
                    *summary.aborted.entry(reason.kind().to_string()).or_default() += 1;
                }
            }
        }
        summary
    }

    /// Total number of runs counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.running + self.suspended + self.completed + self.aborted.values().sum::<usize>()
    }
}
