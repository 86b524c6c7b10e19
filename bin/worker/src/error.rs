//! Error types for the worker binary.

use std::fmt;

/// Errors that stop the worker from starting.
#[derive(Debug)]
pub enum WorkerError {
    /// Configuration could not be loaded.
    Config { reason: String },
    /// The demo data could not be seeded.
    Seed { step: &'static str, reason: String },
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Seed { step, reason } => {
                write!(f, "failed to seed demo data ({step}): {reason}")
            }
        }
    }
}

impl std::error::Error for WorkerError {}

impl WorkerError {
    /// Wraps a failure from one seeding step.
    pub fn seed(step: &'static str, reason: impl fmt::Display) -> Self {
        Self::Seed {
            step,
            reason: reason.to_string(),
        }
    }
}

impl From<config::ConfigError> for WorkerError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config {
            reason: err.to_string(),
        }
    }
}
