// src/core/deploy/stage.rs

//! Per-stage execution: health-check retries, metric sampling/averaging,
//! and threshold validation.

use crate::core::types::{StageMetrics, StageResult, StageStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct StageThresholds {
    pub max_error_rate: f64,
    pub max_response_time_ms: f64,
    pub max_cpu: f64,
    pub max_memory: f64,
}

#[derive(Debug, Clone)]
pub struct StageConfig {
    pub name: String,
    pub percentage: u8,
    pub probe_command: String,
    pub health_check_attempts: u32,
    pub health_check_backoff: Duration,
    pub monitor_duration: Duration,
    pub sample_interval: Duration,
    pub thresholds: StageThresholds,
    pub require_approval: bool,
    pub wait_time: Duration,
}

/// Runs a probe command against a stage's targets; all targets must report
/// exit-zero for the stage to be considered healthy.
#[async_trait]
pub trait HealthChecker: Send + Sync {
    async fn check(&self, stage: &str, probe_command: &str) -> bool;
}

/// Samples one snapshot of observed stage metrics.
#[async_trait]
pub trait MetricSampler: Send + Sync {
    async fn sample(&self, stage: &str) -> StageMetrics;
}

/// The `requireApproval` extension point for deploy stages (same shape as
/// the Remote Executor's: register-then-deny-by-default).
#[async_trait]
pub trait ApprovalGate: Send + Sync {
    async fn approve(&self, stage: &str) -> bool;
}

pub(crate) fn sample_count(monitor_duration: Duration, sample_interval: Duration) -> usize {
    (monitor_duration.as_millis() / sample_interval.as_millis().max(1)).max(1) as usize
}

pub(crate) fn average(samples: &[StageMetrics]) -> StageMetrics {
    if samples.is_empty() {
        return StageMetrics::default();
    }
    let n = samples.len() as f64;
    StageMetrics {
        error_rate: samples.iter().map(|s| s.error_rate).sum::<f64>() / n,
        response_time_ms: samples.iter().map(|s| s.response_time_ms).sum::<f64>() / n,
        cpu: samples.iter().map(|s| s.cpu).sum::<f64>() / n,
        memory: samples.iter().map(|s| s.memory).sum::<f64>() / n,
    }
}

pub(crate) fn first_breach(observed: &StageMetrics, thresholds: &StageThresholds) -> Option<String> {
    if observed.error_rate > thresholds.max_error_rate {
        return Some(format!(
            "error rate {:.3} exceeds max {:.3}",
            observed.error_rate, thresholds.max_error_rate
        ));
    }
    if observed.response_time_ms > thresholds.max_response_time_ms {
        return Some(format!(
            "response time {:.0}ms exceeds max {:.0}ms",
            observed.response_time_ms, thresholds.max_response_time_ms
        ));
    }
    if observed.cpu > thresholds.max_cpu {
        return Some(format!("cpu {:.1}% exceeds max {:.1}%", observed.cpu, thresholds.max_cpu));
    }
    if observed.memory > thresholds.max_memory {
        return Some(format!(
            "memory {:.1}% exceeds max {:.1}%",
            observed.memory, thresholds.max_memory
        ));
    }
    None
}

/// Runs one stage end to end: health check retries, metric monitoring,
/// threshold validation, optional approval gate, then the stage wait time.
pub async fn run_stage(
    stage: &StageConfig,
    health: &dyn HealthChecker,
    sampler: &dyn MetricSampler,
    approvals: &dyn ApprovalGate,
) -> StageResult {
    let started_at = Utc::now();

    let mut healthy = false;
    for attempt in 0..stage.health_check_attempts {
        if health.check(&stage.name, &stage.probe_command).await {
            healthy = true;
            break;
        }
        if attempt + 1 < stage.health_check_attempts {
            tokio::time::sleep(stage.health_check_backoff).await;
        }
    }
    if !healthy {
        return failed(stage, started_at, "health check did not pass".to_string());
    }

    let mut samples = Vec::new();
    let sample_count = sample_count(stage.monitor_duration, stage.sample_interval);
    for _ in 0..sample_count {
        samples.push(sampler.sample(&stage.name).await);
        tokio::time::sleep(stage.sample_interval).await;
    }
    let observed = average(&samples);
    crate::core::metrics::STAGE_ERROR_RATE
        .with_label_values(&[&stage.name])
        .set(observed.error_rate);

    if let Some(reason) = first_breach(&observed, &stage.thresholds) {
        return StageResult {
            name: stage.name.clone(),
            percentage: stage.percentage,
            status: StageStatus::Failed,
            started_at,
            completed_at: Some(Utc::now()),
            observed: Some(observed),
            error: Some(reason),
        };
    }

    if stage.require_approval && !approvals.approve(&stage.name).await {
        return failed(stage, started_at, "stage approval denied".to_string());
    }

    if !stage.wait_time.is_zero() {
        tokio::time::sleep(stage.wait_time).await;
    }

    StageResult {
        name: stage.name.clone(),
        percentage: stage.percentage,
        status: StageStatus::Success,
        started_at,
        completed_at: Some(Utc::now()),
        observed: Some(observed),
        error: None,
    }
}

fn failed(stage: &StageConfig, started_at: chrono::DateTime<Utc>, error: String) -> StageResult {
    StageResult {
        name: stage.name.clone(),
        percentage: stage.percentage,
        status: StageStatus::Failed,
        started_at,
        completed_at: Some(Utc::now()),
        observed: None,
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysHealthy;
    #[async_trait]
    impl HealthChecker for AlwaysHealthy {
        async fn check(&self, _stage: &str, _probe: &str) -> bool {
            true
        }
    }

    struct NeverHealthy;
    #[async_trait]
    impl HealthChecker for NeverHealthy {
        async fn check(&self, _stage: &str, _probe: &str) -> bool {
            false
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

    struct AlwaysDeny;
    #[async_trait]
    impl ApprovalGate for AlwaysDeny {
        async fn approve(&self, _stage: &str) -> bool {
            false
        }
    }

    fn stage(thresholds: StageThresholds, require_approval: bool) -> StageConfig {
        StageConfig {
            name: "production-10".to_string(),
            percentage: 10,
            probe_command: "curl -f http://localhost/health".to_string(),
            health_check_attempts: 2,
            health_check_backoff: Duration::from_millis(1),
            monitor_duration: Duration::from_millis(1),
            sample_interval: Duration::from_millis(1),
            thresholds,
            require_approval,
            wait_time: Duration::ZERO,
        }
    }

    fn lenient_thresholds() -> StageThresholds {
        StageThresholds {
            max_error_rate: 0.05,
            max_response_time_ms: 500.0,
            max_cpu: 90.0,
            max_memory: 90.0,
        }
    }

    #[tokio::test]
    async fn healthy_stage_within_thresholds_succeeds() {
        let sampler = FixedSampler(StageMetrics {
            error_rate: 0.01,
            response_time_ms: 120.0,
            cpu: 40.0,
            memory: 50.0,
        });
        let result = run_stage(&stage(lenient_thresholds(), false), &AlwaysHealthy, &sampler, &AlwaysApprove).await;
        assert_eq!(result.status, StageStatus::Success);
    }

    #[tokio::test]
    async fn failed_health_check_fails_the_stage() {
        let sampler = FixedSampler(StageMetrics::default());
        let result = run_stage(&stage(lenient_thresholds(), false), &NeverHealthy, &sampler, &AlwaysApprove).await;
        assert_eq!(result.status, StageStatus::Failed);
        assert!(result.error.unwrap().contains("health check"));
    }

    // S7
    #[tokio::test]
    async fn threshold_breach_fails_the_stage() {
        let sampler = FixedSampler(StageMetrics {
            error_rate: 0.20,
            response_time_ms: 120.0,
            cpu: 40.0,
            memory: 50.0,
        });
        let result = run_stage(&stage(lenient_thresholds(), false), &AlwaysHealthy, &sampler, &AlwaysApprove).await;
        assert_eq!(result.status, StageStatus::Failed);
        assert!(result.error.unwrap().contains("error rate"));
    }

    #[tokio::test]
    async fn approval_denial_fails_the_stage() {
        let sampler = FixedSampler(StageMetrics {
            error_rate: 0.01,
            response_time_ms: 120.0,
            cpu: 40.0,
            memory: 50.0,
        });
        let result = run_stage(&stage(lenient_thresholds(), true), &AlwaysHealthy, &sampler, &AlwaysDeny).await;
        assert_eq!(result.status, StageStatus::Failed);
        assert!(result.error.unwrap().contains("approval denied"));
    }
}
