//! The periodic sweep.
//!
//! Each pass lists the runs that are ready to move (suspended runs whose
//! wake time has passed, and running runs waiting on a send retry), then
//! processes them concurrently. Runs are isolated: a failure in one run is
//! logged and counted, and the rest of the pass continues.
//!
//! Several sweepers may run against the same store. The executor's version
//! guard makes a run resumed by one sweeper a no-op for the others.

use crate::error::SweepError;
use chrono::{DateTime, Utc};
use creator_flow_core::WorkflowRunId;
use creator_flow_workflow::{Executor, ResumeOutcome, StepOutcome};
use futures::future::join_all;
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

/// Sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Seconds between passes.
    pub interval_seconds: u64,
    /// Maximum runs processed per pass.
    pub batch_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            batch_size: 500,
        }
    }
}

/// Counts from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Runs listed as due.
    pub examined: usize,
    /// Suspended runs whose delay completed in this pass.
    pub resumed: usize,
    /// Runs that reached `Completed`.
    pub completed: usize,
    /// Runs that stopped at their next delay.
    pub suspended: usize,
    /// Runs left at an Email node for another send attempt.
    pub retrying: usize,
    /// Runs that were aborted.
    pub aborted: usize,
    /// Runs another worker moved first, or that were not due after all.
    pub skipped: usize,
    /// Runs whose processing failed; they stay where they were.
    pub failed: usize,
}

impl SweepReport {
    /// Returns true if the pass changed any run.
    #[must_use]
    pub fn moved_anything(&self) -> bool {
        self.resumed + self.completed + self.suspended + self.aborted > 0
    }

    fn tally(&mut self, pass: RunPass) {
        match pass {
            RunPass::Moved { resumed, outcome } => {
                if resumed {
                    self.resumed += 1;
                }
                match outcome {
                    StepOutcome::Completed => self.completed += 1,
                    StepOutcome::Suspended { .. } => self.suspended += 1,
                    StepOutcome::RetryScheduled { .. } => self.retrying += 1,
                    StepOutcome::Aborted(_) => self.aborted += 1,
                    StepOutcome::Advanced | StepOutcome::Idle | StepOutcome::Skipped => {
                        self.skipped += 1;
                    }
                }
            }
            RunPass::Skipped => self.skipped += 1,
            RunPass::Failed => self.failed += 1,
        }
    }
}

enum RunPass {
    Moved { resumed: bool, outcome: StepOutcome },
    Skipped,
    Failed,
}

/// Drives due runs forward.
#[derive(Clone)]
pub struct Sweeper {
    executor: Executor,
    config: SweepConfig,
}

impl Sweeper {
    /// Creates a new sweeper.
    #[must_use]
    pub fn new(executor: Executor, config: SweepConfig) -> Self {
        Self { executor, config }
    }

    /// Runs one pass at the given time.
    ///
    /// # Errors
    ///
    /// Returns an error only if the due runs cannot be listed.
    #[instrument(skip(self))]
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<SweepReport, Report<SweepError>> {
        let due = self
            .executor
            .runs()
            .due_runs(now, self.config.batch_size)
            .await
            .map_err(|e| SweepError::DueRunsUnavailable {
                reason: e.to_string(),
            })?;

        let passes = join_all(due.iter().map(|run_id| self.process(*run_id, now))).await;

        let mut report = SweepReport {
            examined: due.len(),
            ..SweepReport::default()
        };
        for pass in passes {
            report.tally(pass);
        }

        if report.moved_anything() || report.failed > 0 {
            info!(
                examined = report.examined,
                resumed = report.resumed,
                completed = report.completed,
                suspended = report.suspended,
                retrying = report.retrying,
                aborted = report.aborted,
                skipped = report.skipped,
                failed = report.failed,
                "Sweep pass finished"
            );
        } else {
            debug!(examined = report.examined, "Sweep pass finished, nothing moved");
        }
        Ok(report)
    }

    async fn process(&self, run_id: WorkflowRunId, now: DateTime<Utc>) -> RunPass {
        let resumed = match self.executor.resume(run_id, now).await {
            Ok(ResumeOutcome::Advanced) => true,
            // Running runs are waiting on a send retry.
            Ok(ResumeOutcome::NotSuspended) => false,
            Ok(ResumeOutcome::NotDue | ResumeOutcome::Skipped) => return RunPass::Skipped,
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Could not resume run");
                return RunPass::Failed;
            }
        };

        match self.executor.drive(run_id, now).await {
            Ok(outcome) => RunPass::Moved { resumed, outcome },
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "Could not step run");
                RunPass::Failed
            }
        }
    }

    /// Sweeps on a fixed interval until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = Duration::from_secs(self.config.interval_seconds.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            interval_seconds = period.as_secs(),
            batch_size = self.config.batch_size,
            "Sweeper started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Sweeper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(Utc::now()).await {
                        error!(error = %e, "Sweep pass failed");
                    }
                }
            }
        }

        info!("Sweeper stopped");
    }
}
