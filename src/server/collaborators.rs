// src/server/collaborators.rs

//! Concrete SSH/HTTP-backed implementations of the Deploy Manager's and
//! Rollback Engine's extension-point traits, built on the Remote Executor
//! rather than a fresh transport. Keeps concrete infrastructure adapters in
//! `server/` and core logic free of them.

use crate::core::deploy::{DeployTarget, stage};
use crate::core::errors::{OpsError, OpsResult};
use crate::core::rollback::{self, RollbackBackend};
use crate::core::ssh::executor::{ExecOptions, Inventory, RemoteExecutor};
use crate::core::types::{Patch, Target};
use async_trait::async_trait;
use std::sync::Arc;

fn single_target(host: &str) -> Target {
    Target::Hosts(vec![host.to_string()])
}

/// Drives deployment-side effects over SSH via the shared Remote Executor.
pub struct SshDeployTarget {
    pub executor: Arc<RemoteExecutor>,
    pub inventory: Arc<Inventory>,
}

impl SshDeployTarget {
    async fn read_remote_file(&self, target: &str, path: &str) -> OpsResult<String> {
        let result = self
            .executor
            .execute(
                &self.inventory,
                &single_target(target),
                &format!("cat {path} 2>/dev/null || true"),
                &ExecOptions::default(),
            )
            .await;
        Ok(result.results.first().map(|r| r.stdout.clone()).unwrap_or_default())
    }
}

#[async_trait]
impl DeployTarget for SshDeployTarget {
    async fn backup(&self, target: &str, backup_dir: &str) -> OpsResult<()> {
        let command = format!("mkdir -p {backup_dir} && cp -r /opt/opsd/app/. {backup_dir}/");
        run_or_remote_failure(&self.executor, &self.inventory, target, &command).await
    }

    async fn upload(&self, target: &str, patch: &Patch) -> OpsResult<()> {
        for (path, changes) in &patch.files {
            let current = self.read_remote_file(target, path).await?;
            let patched = crate::core::patch::apply_changes(&current, changes);
            let command = format!("cat > {path} <<'OPSD_PATCH_EOF'\n{patched}\nOPSD_PATCH_EOF\n");
            run_or_remote_failure(&self.executor, &self.inventory, target, &command).await?;
        }
        Ok(())
    }

    async fn restart_service(&self, target: &str) -> OpsResult<()> {
        run_or_remote_failure(&self.executor, &self.inventory, target, "systemctl restart opsd-app").await
    }

    async fn shift_traffic(&self, target: &str, percentage: u8) -> OpsResult<()> {
        let command = format!("/opt/opsd/bin/shift-traffic --target {target} --percentage {percentage}");
        run_or_remote_failure(&self.executor, &self.inventory, target, &command).await
    }

    async fn shutdown(&self, target: &str) -> OpsResult<()> {
        run_or_remote_failure(&self.executor, &self.inventory, target, "systemctl stop opsd-app").await
    }
}

/// Restores from the most recent `/tmp/backup-*` directory over SSH.
pub struct SshRollbackBackend {
    pub executor: Arc<RemoteExecutor>,
    pub inventory: Arc<Inventory>,
}

#[async_trait]
impl RollbackBackend for SshRollbackBackend {
    async fn snapshot(&self, target: &str) {
        let _ = run_or_remote_failure(&self.executor, &self.inventory, target, "ps aux > /tmp/opsd-snapshot.txt").await;
    }

    async fn latest_backup_dir(&self, target: &str) -> Option<String> {
        let result = self
            .executor
            .execute(
                &self.inventory,
                &single_target(target),
                "ls -td /tmp/backup-* 2>/dev/null | head -1",
                &ExecOptions::default(),
            )
            .await;
        result
            .results
            .first()
            .filter(|r| r.success)
            .map(|r| r.stdout.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    async fn restore_backup(&self, target: &str, backup_dir: &str) -> OpsResult<()> {
        let command = format!("cp -r {backup_dir}/. /opt/opsd/app/");
        run_or_remote_failure(&self.executor, &self.inventory, target, &command).await
    }

    async fn restart_service(&self, target: &str) -> OpsResult<()> {
        run_or_remote_failure(&self.executor, &self.inventory, target, "systemctl restart opsd-app").await
    }

    async fn health_check(&self, target: &str) -> bool {
        run_or_remote_failure(&self.executor, &self.inventory, target, "systemctl is-active --quiet opsd-app")
            .await
            .is_ok()
    }
}

async fn run_or_remote_failure(
    executor: &RemoteExecutor,
    inventory: &Inventory,
    target: &str,
    command: &str,
) -> OpsResult<()> {
    let result = executor
        .execute(inventory, &single_target(target), command, &ExecOptions::default())
        .await;
    if result.overall_success {
        Ok(())
    } else {
        let reason = result
            .results
            .first()
            .and_then(|r| r.error.clone())
            .unwrap_or_else(|| "remote command failed".to_string());
        Err(OpsError::RemoteFailure(format!("{target}: {reason}")))
    }
}

/// Probes a stage's targets by running the configured probe command over
/// SSH against every host in the stage's group.
pub struct SshHealthChecker {
    pub executor: Arc<RemoteExecutor>,
    pub inventory: Arc<Inventory>,
}

#[async_trait]
impl stage::HealthChecker for SshHealthChecker {
    async fn check(&self, stage: &str, probe_command: &str) -> bool {
        self.executor
            .execute(&self.inventory, &Target::Group(stage.to_string()), probe_command, &ExecOptions::default())
            .await
            .overall_success
    }
}

/// Samples stage metrics from a metrics sidecar over HTTP. The sidecar's
/// scrape/aggregation logic is a collaborator; this adapter only defines
/// the wire shape it expects back.
pub struct HttpMetricSampler {
    pub client: reqwest::Client,
    pub port: u16,
}

#[derive(serde::Deserialize)]
struct StageMetricsPayload {
    error_rate: f64,
    response_time_ms: f64,
    cpu: f64,
    memory: f64,
}

#[async_trait]
impl stage::MetricSampler for HttpMetricSampler {
    async fn sample(&self, stage: &str) -> crate::core::types::StageMetrics {
        let url = format!("http://{stage}:{}/stage-metrics", self.port);
        match self.client.get(&url).send().await {
            Ok(resp) => match resp.json::<StageMetricsPayload>().await {
                Ok(payload) => crate::core::types::StageMetrics {
                    error_rate: payload.error_rate,
                    response_time_ms: payload.response_time_ms,
                    cpu: payload.cpu,
                    memory: payload.memory,
                },
                Err(_) => crate::core::types::StageMetrics::default(),
            },
            Err(_) => crate::core::types::StageMetrics::default(),
        }
    }
}

/// The deny-by-default approval gate shared by deploy stages and the
/// rollback engine: registers the request against the Remote Executor's
/// approval ledger and returns `false`, matching the shared register-then-deny-by-default extension point. An external actor
/// approves out of band via `RemoteExecutor::record_decision`.
pub struct DenyByDefaultApprovalGate {
    pub executor: Arc<RemoteExecutor>,
}

#[async_trait]
impl stage::ApprovalGate for DenyByDefaultApprovalGate {
    async fn approve(&self, stage: &str) -> bool {
        self.executor
            .request_approval(format!("deploy stage '{stage}'"), stage.to_string());
        false
    }
}

#[async_trait]
impl rollback::ApprovalGate for DenyByDefaultApprovalGate {
    async fn approve(&self, deployment_id: &str) -> bool {
        self.executor
            .request_approval(format!("rollback of deployment '{deployment_id}'"), deployment_id.to_string());
        false
    }
}
