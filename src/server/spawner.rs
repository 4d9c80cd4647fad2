// src/server/spawner.rs

//! Spawns opsd's long-running background tasks: the connection pool's idle
//! sweeper, the Orchestrator's heartbeat loop, and (when enabled) the
//! Prometheus metrics server.

use super::context::ServerContext;
use super::metrics_server;
use anyhow::Result;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns every background task into a fresh `JoinSet`. The caller is
/// expected to await the set (or a shutdown signal) to keep the process
/// alive; a task exiting early is itself a signal worth surfacing.
pub fn spawn_all(ctx: &ServerContext) -> Result<JoinSet<()>> {
    let mut tasks = JoinSet::new();

    ctx.pool.spawn_sweeper();

    let orchestrator = ctx.orchestrator.clone();
    tasks.spawn(async move {
        orchestrator.start(HEARTBEAT_INTERVAL).await;
    });

    if let Some(port) = ctx.metrics_port {
        let shutdown_rx = ctx.shutdown_rx();
        tasks.spawn(async move {
            metrics_server::run_metrics_server(port, shutdown_rx).await;
        });
    } else {
        info!("metrics server disabled; no port configured");
    }

    Ok(tasks)
}
