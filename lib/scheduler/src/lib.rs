//! Scheduling for workflow runs.
//!
//! This crate provides the sweep that wakes suspended runs once their delay
//! has elapsed and retries pending sends. It owns no state of its own; every
//! decision about a run is made by the workflow executor.

pub mod error;
pub mod sweep;

pub use error::SweepError;
pub use sweep::{SweepConfig, SweepReport, Sweeper};
