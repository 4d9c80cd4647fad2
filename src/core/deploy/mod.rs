// src/core/deploy/mod.rs

//! The Deploy Manager (C7): `deployHotfix` across canary, blue-green, and
//! direct strategies, with auto-rollback on stage failure.

pub mod stage;

use crate::core::errors::{OpsError, OpsResult};
use crate::core::rollback::{self, RollbackBackend};
use crate::core::types::{Deployment, DeploymentStatus, Patch, StageResult, StageStatus};
use async_trait::async_trait;
use chrono::Utc;
use stage::{ApprovalGate, HealthChecker, MetricSampler, StageConfig};
use uuid::Uuid;

/// The prelude/target-side operations every strategy drives: backup,
/// upload, and restart. A trait so deployment can be exercised without a
/// real fleet.
#[async_trait]
pub trait DeployTarget: Send + Sync {
    async fn backup(&self, target: &str, backup_dir: &str) -> OpsResult<()>;
    async fn upload(&self, target: &str, patch: &Patch) -> OpsResult<()>;
    async fn restart_service(&self, target: &str) -> OpsResult<()>;
    /// Blue-green only: route `percentage` of live traffic to `target` (the
    /// green environment). Implementations own how the remaining traffic
    /// stays on blue.
    async fn shift_traffic(&self, target: &str, percentage: u8) -> OpsResult<()>;
    /// Blue-green only: tear down an environment that no longer carries
    /// traffic (blue on success, green on a reverted deploy).
    async fn shutdown(&self, target: &str) -> OpsResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Canary,
    BlueGreen,
    Direct,
}

pub struct DeployRequest {
    pub patch: Patch,
    pub repository: String,
    pub strategy: Strategy,
    pub auto_rollback: bool,
    pub targets: Vec<String>,
    /// The live environment blue-green reverts traffic to on breach and
    /// shuts down on success. Unused by canary/direct.
    pub blue_targets: Vec<String>,
}

const BLUE_GREEN_TRAFFIC_STEPS: [u8; 3] = [10, 50, 100];

/// The Deploy Manager. Holds the injected collaborators every stage and
/// the rollback path need.
pub struct DeployManager {
    pub target: Box<dyn DeployTarget>,
    pub health: Box<dyn HealthChecker>,
    pub sampler: Box<dyn MetricSampler>,
    pub approvals: Box<dyn ApprovalGate>,
    pub rollback_backend: Box<dyn RollbackBackend>,
    pub rollback_approvals: Box<dyn rollback::ApprovalGate>,
}

fn backup_dir() -> String {
    format!("/tmp/backup-{}", Utc::now().timestamp_millis())
}

fn stage_status_from(result: &StageResult) -> DeploymentStatus {
    if result.status == StageStatus::Success {
        DeploymentStatus::Completed
    } else {
        DeploymentStatus::Failed
    }
}

impl DeployManager {
    async fn prelude(&self, targets: &[String], patch: &Patch) -> OpsResult<String> {
        let dir = backup_dir();
        for target in targets {
            self.target.backup(target, &dir).await?;
            self.target.upload(target, patch).await?;
            self.target.restart_service(target).await?;
        }
        Ok(dir)
    }

    fn failed_stage(name: &str, percentage: u8, error: String) -> StageResult {
        let now = Utc::now();
        StageResult {
            name: name.to_string(),
            percentage,
            status: StageStatus::Failed,
            started_at: now,
            completed_at: Some(now),
            observed: None,
            error: Some(error),
        }
    }

    /// Shifts traffic back to blue entirely, best-effort: a revert failure
    /// is logged but does not change the deployment's already-failed status.
    async fn revert_to_blue(&self, request: &DeployRequest) {
        for blue in &request.blue_targets {
            if let Err(e) = self.target.shift_traffic(blue, 100).await {
                tracing::warn!(host = %blue, error = %e, "failed to revert traffic to blue after breach");
            }
        }
    }

    async fn shutdown_blue(&self, request: &DeployRequest) {
        for blue in &request.blue_targets {
            if let Err(e) = self.target.shutdown(blue).await {
                tracing::warn!(host = %blue, error = %e, "failed to shut down blue after successful cutover");
            }
        }
    }

    /// Blue-green rollout: health-check green once, then walk the
    /// 10%→50%→100% traffic-shift steps, monitoring and validating
    /// thresholds at each one. Any breach reverts traffic to blue entirely
    /// and fails the deployment; reaching 100% shuts blue down.
    async fn deploy_blue_green(&self, request: &DeployRequest, template: &StageConfig, deployment: &mut Deployment) {
        let green = request.targets.join(",");

        let mut healthy = false;
        for attempt in 0..template.health_check_attempts {
            if self.health.check("green", &template.probe_command).await {
                healthy = true;
                break;
            }
            if attempt + 1 < template.health_check_attempts {
                tokio::time::sleep(template.health_check_backoff).await;
            }
        }
        if !healthy {
            deployment.status = DeploymentStatus::Failed;
            deployment
                .stages
                .push(Self::failed_stage("green", 0, "health check did not pass".to_string()));
            return;
        }

        for percentage in BLUE_GREEN_TRAFFIC_STEPS {
            let stage_name = format!("green-{percentage}");
            let started_at = Utc::now();

            if let Err(e) = self.target.shift_traffic(&green, percentage).await {
                deployment.status = DeploymentStatus::Failed;
                deployment
                    .stages
                    .push(Self::failed_stage(&stage_name, percentage, format!("traffic shift failed: {e}")));
                self.revert_to_blue(request).await;
                return;
            }

            let sample_count = stage::sample_count(template.monitor_duration, template.sample_interval);
            let mut samples = Vec::with_capacity(sample_count);
            for _ in 0..sample_count {
                samples.push(self.sampler.sample(&stage_name).await);
                tokio::time::sleep(template.sample_interval).await;
            }
            let observed = stage::average(&samples);
            crate::core::metrics::STAGE_ERROR_RATE
                .with_label_values(&[&stage_name])
                .set(observed.error_rate);

            if let Some(reason) = stage::first_breach(&observed, &template.thresholds) {
                deployment.status = DeploymentStatus::Failed;
                deployment.stages.push(StageResult {
                    name: stage_name,
                    percentage,
                    status: StageStatus::Failed,
                    started_at,
                    completed_at: Some(Utc::now()),
                    observed: Some(observed),
                    error: Some(reason),
                });
                self.revert_to_blue(request).await;
                return;
            }

            deployment.status = DeploymentStatus::Completed;
            deployment.stages.push(StageResult {
                name: stage_name,
                percentage,
                status: StageStatus::Success,
                started_at,
                completed_at: Some(Utc::now()),
                observed: Some(observed),
                error: None,
            });
        }

        self.shutdown_blue(request).await;
    }

    async fn maybe_rollback(&self, deployment: &mut Deployment) {
        if deployment.status != DeploymentStatus::Failed {
            return;
        }
        match rollback::rollback(
            deployment,
            "deployment stage failure",
            true,
            false,
            self.rollback_backend.as_ref(),
            self.rollback_approvals.as_ref(),
        )
        .await
        {
            Ok(record) if record.success => deployment.status = DeploymentStatus::RolledBack,
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "rollback after deploy failure did not complete cleanly"),
        }
    }

    /// Runs `request.strategy`'s canary/blue-green/direct stages in order,
    /// rolling back on failure when `auto_rollback` is set.
    pub async fn deploy_hotfix(&self, request: DeployRequest, stages: Vec<StageConfig>) -> OpsResult<Deployment> {
        let _backup_dir = self.prelude(&request.targets, &request.patch).await?;

        let mut deployment = Deployment {
            id: Uuid::new_v4().to_string(),
            patch_id: request.patch.id.clone(),
            repository: request.repository.clone(),
            strategy: match request.strategy {
                Strategy::Canary => crate::core::types::DeployStrategy::Canary,
                Strategy::BlueGreen => crate::core::types::DeployStrategy::BlueGreen,
                Strategy::Direct => crate::core::types::DeployStrategy::Direct,
            },
            stages: Vec::new(),
            status: DeploymentStatus::Completed,
            started_at: Utc::now(),
            completed_at: None,
        };

        match request.strategy {
            Strategy::BlueGreen => {
                let template = stages
                    .first()
                    .ok_or_else(|| OpsError::ValidationBreach("blue-green deploy requires a stage config".to_string()))?;
                self.deploy_blue_green(&request, template, &mut deployment).await;
            }
            Strategy::Canary | Strategy::Direct => {
                for stage_config in &stages {
                    let result = stage::run_stage(
                        stage_config,
                        self.health.as_ref(),
                        self.sampler.as_ref(),
                        self.approvals.as_ref(),
                    )
                    .await;
                    let failed = result.status == StageStatus::Failed;
                    deployment.status = stage_status_from(&result);
                    deployment.stages.push(result);
                    if failed {
                        break;
                    }
                }
            }
        }

        deployment.completed_at = Some(Utc::now());

        let strategy_label = match request.strategy {
            Strategy::Canary => "canary",
            Strategy::BlueGreen => "blue_green",
            Strategy::Direct => "direct",
        };

        if deployment.status == DeploymentStatus::Failed {
            crate::core::metrics::DEPLOYMENTS_TOTAL
                .with_label_values(&[strategy_label, "failed"])
                .inc();
            // Blue-green already reverted traffic to blue inline; the
            // generic backup/restore Rollback Engine only applies to
            // canary/direct, which actually went live on the target hosts.
            if request.auto_rollback && request.strategy != Strategy::BlueGreen {
                self.maybe_rollback(&mut deployment).await;
            }
            return Err(OpsError::ValidationBreach(format!(
                "deployment {} failed at stage '{}'",
                deployment.id,
                deployment.stages.last().map(|s| s.name.as_str()).unwrap_or("unknown")
            )));
        }

        crate::core::metrics::DEPLOYMENTS_TOTAL
            .with_label_values(&[strategy_label, "completed"])
            .inc();
        Ok(deployment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StageMetrics;
    use std::collections::HashMap;
    use std::time::Duration;

    struct NoopTarget;
    #[async_trait]
    impl DeployTarget for NoopTarget {
        async fn backup(&self, _target: &str, _dir: &str) -> OpsResult<()> {
            Ok(())
        }
        async fn upload(&self, _target: &str, _patch: &Patch) -> OpsResult<()> {
            Ok(())
        }
        async fn restart_service(&self, _target: &str) -> OpsResult<()> {
            Ok(())
        }
        async fn shift_traffic(&self, _target: &str, _percentage: u8) -> OpsResult<()> {
            Ok(())
        }
        async fn shutdown(&self, _target: &str) -> OpsResult<()> {
            Ok(())
        }
    }

    /// Records every `shift_traffic`/`shutdown` call so blue-green tests can
    /// assert on the traffic-step and cutover sequence.
    #[derive(Default)]
    struct RecordingTarget {
        calls: std::sync::Mutex<Vec<String>>,
    }
    #[async_trait]
    impl DeployTarget for RecordingTarget {
        async fn backup(&self, _target: &str, _dir: &str) -> OpsResult<()> {
            Ok(())
        }
        async fn upload(&self, _target: &str, _patch: &Patch) -> OpsResult<()> {
            Ok(())
        }
        async fn restart_service(&self, _target: &str) -> OpsResult<()> {
            Ok(())
        }
        async fn shift_traffic(&self, target: &str, percentage: u8) -> OpsResult<()> {
            self.calls.lock().unwrap().push(format!("shift:{target}:{percentage}"));
            Ok(())
        }
        async fn shutdown(&self, target: &str) -> OpsResult<()> {
            self.calls.lock().unwrap().push(format!("shutdown:{target}"));
            Ok(())
        }
    }

    #[async_trait]
    impl DeployTarget for std::sync::Arc<RecordingTarget> {
        async fn backup(&self, target: &str, dir: &str) -> OpsResult<()> {
            self.as_ref().backup(target, dir).await
        }
        async fn upload(&self, target: &str, patch: &Patch) -> OpsResult<()> {
            self.as_ref().upload(target, patch).await
        }
        async fn restart_service(&self, target: &str) -> OpsResult<()> {
            self.as_ref().restart_service(target).await
        }
        async fn shift_traffic(&self, target: &str, percentage: u8) -> OpsResult<()> {
            self.as_ref().shift_traffic(target, percentage).await
        }
        async fn shutdown(&self, target: &str) -> OpsResult<()> {
            self.as_ref().shutdown(target).await
        }
    }

    struct ScriptedSampler(std::sync::Mutex<std::collections::VecDeque<StageMetrics>>);
    #[async_trait]
    impl MetricSampler for ScriptedSampler {
        async fn sample(&self, _stage: &str) -> StageMetrics {
            self.0.lock().unwrap().pop_front().expect("sampler exhausted")
        }
    }

    struct AlwaysHealthy;
    #[async_trait]
    impl HealthChecker for AlwaysHealthy {
        async fn check(&self, _stage: &str, _probe: &str) -> bool {
            true
        }
    }

    struct ScriptedHealth(std::sync::Mutex<Vec<bool>>);
    #[async_trait]
    impl HealthChecker for ScriptedHealth {
        async fn check(&self, _stage: &str, _probe: &str) -> bool {
            self.0.lock().unwrap().remove(0)
        }
    }

    struct FixedSampler(StageMetrics);
    #[async_trait]
    impl MetricSampler for FixedSampler {
        async fn sample(&self, _stage: &str) -> StageMetrics {
            self.0
        }
    }

    struct AlwaysApprove;
    #[async_trait]
    impl ApprovalGate for AlwaysApprove {
        async fn approve(&self, _stage: &str) -> bool {
            true
        }
    }
    #[async_trait]
    impl rollback::ApprovalGate for AlwaysApprove {
        async fn approve(&self, _id: &str) -> bool {
            true
        }
    }

    struct FakeRollbackBackend;
    #[async_trait]
    impl RollbackBackend for FakeRollbackBackend {
        async fn snapshot(&self, _target: &str) {}
        async fn latest_backup_dir(&self, target: &str) -> Option<String> {
            Some(format!("/tmp/backup-{target}"))
        }
        async fn restore_backup(&self, _target: &str, _dir: &str) -> OpsResult<()> {
            Ok(())
        }
        async fn restart_service(&self, _target: &str) -> OpsResult<()> {
            Ok(())
        }
        async fn health_check(&self, _target: &str) -> bool {
            true
        }
    }

    fn patch() -> Patch {
        Patch {
            id: "patch-1".to_string(),
            issue_type: "connection_leak".to_string(),
            pattern: "connection_leak".to_string(),
            files: HashMap::new(),
            confidence: 0.8,
            timestamp: Utc::now(),
        }
    }

    fn stage_config(name: &str, pct: u8) -> StageConfig {
        StageConfig {
            name: name.to_string(),
            percentage: pct,
            probe_command: "curl -f http://localhost/health".to_string(),
            health_check_attempts: 1,
            health_check_backoff: Duration::ZERO,
            monitor_duration: Duration::from_millis(1),
            sample_interval: Duration::from_millis(1),
            thresholds: stage::StageThresholds {
                max_error_rate: 0.05,
                max_response_time_ms: 500.0,
                max_cpu: 90.0,
                max_memory: 90.0,
            },
            require_approval: false,
            wait_time: Duration::ZERO,
        }
    }

    fn manager(health: Box<dyn HealthChecker>, sampler: StageMetrics) -> DeployManager {
        DeployManager {
            target: Box::new(NoopTarget),
            health,
            sampler: Box::new(FixedSampler(sampler)),
            approvals: Box::new(AlwaysApprove),
            rollback_backend: Box::new(FakeRollbackBackend),
            rollback_approvals: Box::new(AlwaysApprove),
        }
    }

    fn healthy_metrics() -> StageMetrics {
        StageMetrics {
            error_rate: 0.01,
            response_time_ms: 100.0,
            cpu: 30.0,
            memory: 40.0,
        }
    }

    #[tokio::test]
    async fn direct_strategy_single_stage_succeeds() {
        let mgr = manager(Box::new(AlwaysHealthy), healthy_metrics());
        let request = DeployRequest {
            patch: patch(),
            repository: "example/repo".to_string(),
            strategy: Strategy::Direct,
            auto_rollback: false,
            targets: vec!["prod-01".to_string()],
            blue_targets: vec![],
        };
        let deployment = mgr.deploy_hotfix(request, vec![stage_config("production", 100)]).await.unwrap();
        assert_eq!(deployment.status, DeploymentStatus::Completed);
        assert_eq!(deployment.stages.len(), 1);
    }

    // S7
    #[tokio::test]
    async fn canary_rejection_triggers_rollback_when_enabled() {
        let mgr = manager(Box::new(ScriptedHealth(std::sync::Mutex::new(vec![true, false]))), healthy_metrics());
        let request = DeployRequest {
            patch: patch(),
            repository: "example/repo".to_string(),
            strategy: Strategy::Canary,
            auto_rollback: true,
            targets: vec!["prod-01".to_string()],
            blue_targets: vec![],
        };
        let stages = vec![stage_config("staging", 0), stage_config("production-10", 10)];
        let err = mgr.deploy_hotfix(request, stages).await.unwrap_err();
        assert!(matches!(err, OpsError::ValidationBreach(_)));
    }

    #[tokio::test]
    async fn stage_failure_without_auto_rollback_stays_failed() {
        let mgr = manager(Box::new(ScriptedHealth(std::sync::Mutex::new(vec![false]))), healthy_metrics());
        let request = DeployRequest {
            patch: patch(),
            repository: "example/repo".to_string(),
            strategy: Strategy::Canary,
            auto_rollback: false,
            targets: vec!["prod-01".to_string()],
            blue_targets: vec![],
        };
        let err = mgr.deploy_hotfix(request, vec![stage_config("staging", 0)]).await.unwrap_err();
        assert!(matches!(err, OpsError::ValidationBreach(_)));
    }

    #[tokio::test]
    async fn blue_green_success_shifts_traffic_in_order_then_shuts_down_blue() {
        let recorder = std::sync::Arc::new(RecordingTarget::default());

        let mgr = DeployManager {
            target: Box::new(recorder.clone()),
            health: Box::new(AlwaysHealthy),
            sampler: Box::new(FixedSampler(healthy_metrics())),
            approvals: Box::new(AlwaysApprove),
            rollback_backend: Box::new(FakeRollbackBackend),
            rollback_approvals: Box::new(AlwaysApprove),
        };
        let request = DeployRequest {
            patch: patch(),
            repository: "example/repo".to_string(),
            strategy: Strategy::BlueGreen,
            auto_rollback: true,
            targets: vec!["green-01".to_string()],
            blue_targets: vec!["blue-01".to_string()],
        };

        let deployment = mgr.deploy_hotfix(request, vec![stage_config("green", 0)]).await.unwrap();

        assert_eq!(deployment.status, DeploymentStatus::Completed);
        assert_eq!(deployment.stages.len(), 3);
        assert!(deployment.stages.iter().all(|s| s.status == StageStatus::Success));
        assert_eq!(
            deployment.stages.iter().map(|s| s.percentage).collect::<Vec<_>>(),
            vec![10, 50, 100]
        );
        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "shift:green-01:10".to_string(),
                "shift:green-01:50".to_string(),
                "shift:green-01:100".to_string(),
                "shutdown:blue-01".to_string(),
            ]
        );
    }

    // S-blue-green-breach
    #[tokio::test]
    async fn blue_green_breach_reverts_traffic_to_blue_without_shutdown() {
        let recorder = std::sync::Arc::new(RecordingTarget::default());

        let breaching = StageMetrics {
            error_rate: 0.5,
            response_time_ms: 100.0,
            cpu: 30.0,
            memory: 40.0,
        };
        let sampler = ScriptedSampler(std::sync::Mutex::new(std::collections::VecDeque::from([
            healthy_metrics(),
            breaching,
        ])));

        let mgr = DeployManager {
            target: Box::new(recorder.clone()),
            health: Box::new(AlwaysHealthy),
            sampler: Box::new(sampler),
            approvals: Box::new(AlwaysApprove),
            rollback_backend: Box::new(FakeRollbackBackend),
            rollback_approvals: Box::new(AlwaysApprove),
        };
        let request = DeployRequest {
            patch: patch(),
            repository: "example/repo".to_string(),
            strategy: Strategy::BlueGreen,
            auto_rollback: true,
            targets: vec!["green-01".to_string()],
            blue_targets: vec!["blue-01".to_string()],
        };

        let err = mgr.deploy_hotfix(request, vec![stage_config("green", 0)]).await.unwrap_err();

        assert!(matches!(err, OpsError::ValidationBreach(_)));
        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "shift:green-01:10".to_string(),
                "shift:green-01:50".to_string(),
                "shift:blue-01:100".to_string(),
            ]
        );
        assert!(!calls.iter().any(|c| c.starts_with("shutdown")));
    }
}
