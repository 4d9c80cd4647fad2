// src/core/rollback/mod.rs

//! The Rollback Engine (C8): selects affected stages, restores the most
//! recent backup per target in reverse order, restarts services, and
//! verifies health across everything it touched.

use crate::core::errors::{OpsError, OpsResult};
use crate::core::types::{Deployment, RestoredStage, RollbackRecord, StageStatus};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

/// Target-side effects the Rollback Engine drives. A trait so tests never
/// touch the filesystem or a real process.
#[async_trait]
pub trait RollbackBackend: Send + Sync {
    /// Captures current observable state (processes/services/disk/mem/
    /// network) for audit purposes; best-effort.
    async fn snapshot(&self, target: &str);
    /// The most recently modified `/tmp/backup-*` directory for `target`,
    /// equivalent to `ls -t /tmp/backup-*` picking the newest entry.
    async fn latest_backup_dir(&self, target: &str) -> Option<String>;
    async fn restore_backup(&self, target: &str, backup_dir: &str) -> OpsResult<()>;
    async fn restart_service(&self, target: &str) -> OpsResult<()>;
    async fn health_check(&self, target: &str) -> bool;
}

/// The `requireApproval`/dry-run gate for critical rollbacks (e.g. a
/// database rollback).
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn approve(&self, deployment_id: &str) -> bool;
}

fn affected_stage_names(deployment: &Deployment, partial: bool) -> Vec<String> {
    deployment
        .stages
        .iter()
        .filter(|s| {
            if partial {
                matches!(s.status, StageStatus::Failed | StageStatus::InProgress)
            } else {
                s.status == StageStatus::Success
            }
        })
        .map(|s| s.name.clone())
        .collect()
}

/// Runs the rollback. `critical` marks operations (e.g. a DB rollback)
/// that require explicit approval and default to dry-run.
pub async fn rollback(
    deployment: &Deployment,
    reason: &str,
    partial: bool,
    critical: bool,
    backend: &dyn RollbackBackend,
    approvals: &dyn ApprovalGate,
) -> OpsResult<RollbackRecord> {
    let mut stages = affected_stage_names(deployment, partial);
    stages.reverse();

    let dry_run = critical && !approvals.approve(&deployment.id).await;

    info!(deployment_id = %deployment.id, reason, partial, dry_run, "rollback starting");

    let mut restored = Vec::with_capacity(stages.len());
    for stage in &stages {
        backend.snapshot(stage).await;

        if dry_run {
            restored.push(RestoredStage {
                stage: stage.clone(),
                backup_dir: None,
                service_restarted: false,
                healthy: true,
            });
            continue;
        }

        let backup_dir = backend.latest_backup_dir(stage).await;
        let mut service_restarted = false;
        if let Some(dir) = &backup_dir {
            backend.restore_backup(stage, dir).await?;
            backend.restart_service(stage).await?;
            service_restarted = true;
        } else {
            warn!(stage, "no backup directory found for rollback target");
        }

        let healthy = backend.health_check(stage).await;
        restored.push(RestoredStage {
            stage: stage.clone(),
            backup_dir,
            service_restarted,
            healthy,
        });
    }

    let all_healthy = restored.iter().all(|r| r.healthy);
    if !dry_run && !all_healthy {
        crate::core::metrics::ROLLBACKS_TOTAL.with_label_values(&["unhealthy"]).inc();
        return Err(OpsError::Unrecoverable("rolled back but unhealthy".to_string()));
    }

    crate::core::metrics::ROLLBACKS_TOTAL
        .with_label_values(&[if dry_run { "dry_run" } else { "success" }])
        .inc();

    Ok(RollbackRecord {
        deployment_id: deployment.id.clone(),
        reason: reason.to_string(),
        partial,
        restored,
        success: all_healthy,
        dry_run,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DeployStrategy, DeploymentStatus, StageResult};
    use std::sync::Mutex;

    struct FakeBackend {
        healthy: bool,
        backups: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RollbackBackend for FakeBackend {
        async fn snapshot(&self, _target: &str) {}
        async fn latest_backup_dir(&self, target: &str) -> Option<String> {
            Some(format!("/tmp/backup-{target}"))
        }
        async fn restore_backup(&self, target: &str, backup_dir: &str) -> OpsResult<()> {
            self.backups.lock().unwrap().push(format!("{target}<-{backup_dir}"));
            Ok(())
        }
        async fn restart_service(&self, _target: &str) -> OpsResult<()> {
            Ok(())
        }
        async fn health_check(&self, _target: &str) -> bool {
            self.healthy
        }
    }

    struct AlwaysApprove;
    #[async_trait]
    impl ApprovalGate for AlwaysApprove {
        async fn approve(&self, _id: &str) -> bool {
            true
        }
    }

    struct AlwaysDeny;
    #[async_trait]
    impl ApprovalGate for AlwaysDeny {
        async fn approve(&self, _id: &str) -> bool {
            false
        }
    }

    fn deployment() -> Deployment {
        Deployment {
            id: "dep-1".to_string(),
            patch_id: "patch-1".to_string(),
            repository: "example/repo".to_string(),
            strategy: DeployStrategy::Canary,
            stages: vec![
                StageResult {
                    name: "staging".to_string(),
                    percentage: 0,
                    status: StageStatus::Success,
                    started_at: Utc::now(),
                    completed_at: Some(Utc::now()),
                    observed: None,
                    error: None,
                },
                StageResult {
                    name: "production-10".to_string(),
                    percentage: 10,
                    status: StageStatus::Failed,
                    started_at: Utc::now(),
                    completed_at: Some(Utc::now()),
                    observed: None,
                    error: Some("breach".to_string()),
                },
            ],
            status: DeploymentStatus::Failed,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn full_rollback_restores_success_stages_in_reverse_order() {
        let backend = FakeBackend {
            healthy: true,
            backups: Mutex::new(Vec::new()),
        };
        let record = rollback(&deployment(), "breach", false, false, &backend, &AlwaysApprove)
            .await
            .unwrap();
        assert!(record.success);
        assert_eq!(record.restored.len(), 1);
        assert_eq!(record.restored[0].stage, "staging");
    }

    #[tokio::test]
    async fn partial_rollback_targets_failed_and_in_progress_stages() {
        let backend = FakeBackend {
            healthy: true,
            backups: Mutex::new(Vec::new()),
        };
        let record = rollback(&deployment(), "breach", true, false, &backend, &AlwaysApprove)
            .await
            .unwrap();
        assert_eq!(record.restored.len(), 1);
        assert_eq!(record.restored[0].stage, "production-10");
    }

    #[tokio::test]
    async fn unhealthy_post_rollback_state_is_unrecoverable() {
        let backend = FakeBackend {
            healthy: false,
            backups: Mutex::new(Vec::new()),
        };
        let err = rollback(&deployment(), "breach", false, false, &backend, &AlwaysApprove)
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::Unrecoverable(_)));
    }

    #[tokio::test]
    async fn critical_rollback_without_approval_defaults_to_dry_run() {
        let backend = FakeBackend {
            healthy: false,
            backups: Mutex::new(Vec::new()),
        };
        let record = rollback(&deployment(), "breach", false, true, &backend, &AlwaysDeny)
            .await
            .unwrap();
        assert!(record.dry_run);
        assert!(record.success);
        assert!(backend.backups.lock().unwrap().is_empty());
    }
}
