// src/server/initialization.rs

//! Builds a `ServerContext` from a loaded `OpsdConfig`: resolves the host
//! inventory, wires the SSH-backed collaborators, and assembles the
//! Orchestrator's four scheduled tasks.

use crate::config::OpsdConfig;
use crate::core::alerts::AlertPipeline;
use crate::core::autoheal::AutoHealExecutor;
use crate::core::deploy::DeployManager;
use crate::core::orchestrator::Orchestrator;
use crate::core::pool::{ConnectionPool, PoolConfig};
use crate::core::rollback;
use crate::core::ssh::executor::{Inventory, RemoteExecutor};
use crate::core::ssh::policy::Allowlist;
use crate::core::ticketing::TicketingAdapter;
use crate::core::types::{Host, HostGroups};
use crate::server::collaborators::{
    DenyByDefaultApprovalGate, HttpMetricSampler, SshDeployTarget, SshHealthChecker, SshRollbackBackend,
};
use crate::server::context::ServerContext;
use crate::server::tasks::{AlertsTask, FileReportTask, LogsTask, MetricsTask};
use anyhow::{Context as _, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Resolves the configured private key material, either inline or read
/// from the path on disk.
async fn resolve_private_key(config: &OpsdConfig) -> Result<String> {
    if let Some(inline) = &config.servers.ssh.private_key {
        return Ok(inline.clone());
    }
    let path = config
        .servers
        .ssh
        .key_path
        .as_ref()
        .context("servers.ssh must set private_key or key_path")?;
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading private key at {path}"))
}

fn build_inventory(config: &OpsdConfig, private_key: &str) -> Inventory {
    let mut hosts = HashMap::new();
    for members in config.servers.groups.values() {
        for address in members {
            hosts.entry(address.clone()).or_insert_with(|| Host {
                id: address.clone(),
                address: address.clone(),
                port: config.servers.ssh.port,
                user: config.servers.ssh.user.clone(),
                private_key: private_key.to_string(),
            });
        }
    }
    Inventory {
        hosts,
        groups: HostGroups(config.servers.groups.clone()),
    }
}

/// Assembles a complete `ServerContext` from configuration. Collaborators
/// out of scope for this crate (concrete metrics sources, log collectors)
/// are left to the caller to override; this crate wires only what it owns.
pub async fn setup(config: OpsdConfig, metrics_source: Arc<dyn crate::core::collaborators::MetricsSource>) -> Result<ServerContext> {
    config.validate()?;

    let private_key = resolve_private_key(&config).await?;
    let inventory = Arc::new(build_inventory(&config, &private_key));

    let pool = ConnectionPool::new(PoolConfig::default());
    let allowlist = Allowlist::new(config.ssh_allowlist.allowed_commands.clone());
    let executor = Arc::new(RemoteExecutor::new(pool.clone(), allowlist));

    let autoheal = Arc::new(AutoHealExecutor::new(config.playbooks.clone()));

    let ticketing = if config.ticketing.enabled {
        Some(TicketingAdapter::new(config.ticketing.clone()))
    } else {
        None
    };

    let deploy = Arc::new(DeployManager {
        target: Box::new(SshDeployTarget {
            executor: executor.clone(),
            inventory: inventory.clone(),
        }),
        health: Box::new(SshHealthChecker {
            executor: executor.clone(),
            inventory: inventory.clone(),
        }),
        sampler: Box::new(HttpMetricSampler {
            client: reqwest::Client::new(),
            port: 9_100,
        }),
        approvals: Box::new(DenyByDefaultApprovalGate {
            executor: executor.clone(),
        }),
        rollback_backend: Box::new(SshRollbackBackend {
            executor: executor.clone(),
            inventory: inventory.clone(),
        }),
        rollback_approvals: Box::new(DenyByDefaultApprovalGate {
            executor: executor.clone(),
        }) as Box<dyn rollback::ApprovalGate>,
    });

    let alerts = Arc::new(Mutex::new(AlertPipeline::new(config.alert_thresholds.clone(), ticketing)));

    let accumulator = Arc::new(Mutex::new(crate::server::tasks::SummaryAccumulator::default()));
    let metrics_task = Arc::new(MetricsTask::new(metrics_source.clone(), accumulator.clone()));
    let logs_task = Arc::new(LogsTask::new(
        Arc::new(crate::core::collaborators::NullLogCollector),
        inventory.clone(),
        accumulator.clone(),
    ));
    let alerts_task = Arc::new(AlertsTask::new(
        metrics_source,
        alerts.clone(),
        autoheal.clone(),
        accumulator.clone(),
    ));
    let report_task = Arc::new(FileReportTask::new(accumulator, "/var/lib/opsd/reports"));

    let orchestrator = Arc::new(Orchestrator::new(metrics_task, logs_task, alerts_task, report_task));

    let (shutdown_tx, _) = broadcast::channel(1);

    Ok(ServerContext {
        pool,
        inventory,
        executor,
        autoheal,
        deploy,
        alerts,
        orchestrator,
        metrics_port: Some(9_464),
        shutdown_tx,
    })
}
