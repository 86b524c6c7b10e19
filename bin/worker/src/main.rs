//! creator-flow background worker.
//!
//! Loads configuration, optionally seeds demo data, and sweeps workflow runs
//! until interrupted.

mod collaborators;
mod config;
mod error;
mod runtime;
mod seed;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::runtime::Runtime;
use chrono::Utc;
use creator_flow_core::{CreatorId, FixedStorefronts};
use rootcause::prelude::Report;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Report<WorkerError>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env().map_err(WorkerError::from)?;
    tracing::info!(
        interval_seconds = config.sweep.interval_seconds,
        batch_size = config.sweep.batch_size,
        seed_demo = config.seed_demo,
        "Loaded configuration"
    );

    let demo_creator = CreatorId::new();
    let storefronts = if config.seed_demo {
        FixedStorefronts::new().with(demo_creator, seed::DEMO_STORE_URL)
    } else {
        FixedStorefronts::new()
    };
    let runtime = Runtime::in_memory(&config, storefronts);

    if config.seed_demo {
        seed::seed_demo(&runtime, demo_creator, Utc::now()).await?;
    }

    runtime
        .sweeper
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
