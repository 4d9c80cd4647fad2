// src/server/mod.rs

//! Process-level composition: builds a `ServerContext` from configuration,
//! spawns the background tasks, and runs until a shutdown signal arrives.

pub mod collaborators;
pub mod context;
pub mod initialization;
pub mod metrics_server;
pub mod spawner;
pub mod tasks;

use crate::config::OpsdConfig;
use anyhow::Result;
use tracing::info;

/// Runs an opsd process to completion: composes the context, spawns the
/// Orchestrator heartbeat loop, connection-pool sweeper, and metrics
/// server, then blocks until Ctrl-C or a background task exits.
pub async fn run(config: OpsdConfig, metrics_source: std::sync::Arc<dyn crate::core::collaborators::MetricsSource>) -> Result<()> {
    let ctx = initialization::setup(config, metrics_source).await?;
    let mut tasks = spawner::spawn_all(&ctx)?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
        Some(result) = tasks.join_next() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "background task panicked");
            }
        }
    }

    let _ = ctx.shutdown_tx.send(());
    ctx.pool.close_all().await;
    tasks.shutdown().await;
    Ok(())
}
