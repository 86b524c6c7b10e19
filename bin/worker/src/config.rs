//! Worker configuration.
//!
//! Loaded via the `config` crate from environment variables prefixed with
//! `CREATOR_FLOW`, using `__` to separate nested keys, for example
//! `CREATOR_FLOW__SWEEP__INTERVAL_SECONDS=10`. Every field has a default.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};
use creator_flow_automation::DispatchConfig;
use creator_flow_conversation::DEFAULT_HISTORY_LIMIT;
use creator_flow_scheduler::SweepConfig;
use creator_flow_workflow::ExecutorConfig;
use serde::Deserialize;

const ENV_PREFIX: &str = "CREATOR_FLOW";

/// Worker configuration composed from library configs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Sweep interval and batch size.
    pub sweep: SweepConfig,

    /// Send retry and step budget for workflow runs.
    pub executor: ExecutorConfig,

    /// Match policy and delivery retry for automation replies.
    pub dispatch: DispatchConfig,

    /// Conversation handoff settings.
    pub conversation: ConversationConfig,

    /// Publish the generated default workflows for a demo creator on startup.
    pub seed_demo: bool,
}

/// Conversation-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Prior turns carried by a conversational handoff.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_builder(
            config::Config::builder().add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder.build()?.try_deserialize()
    }
}
