// src/core/types.rs

//! Shared data model for the operations-automation engine: hosts, execution
//! results, alerts, playbooks, incidents, patches, deployments, and tickets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single managed host: stable identity plus the SSH parameters needed to
/// reach it. Identity is normalized to lower-case when used as a pool/cache
/// key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub address: String,
    pub port: u16,
    pub user: String,
    /// PEM-encoded private key material. Loading key files from disk is a
    /// caller concern; this crate only accepts already-loaded bytes.
    pub private_key: String,
}

impl Host {
    /// The lower-cased key used by the connection pool and audit trail.
    pub fn key(&self) -> String {
        self.id.to_lowercase()
    }
}

/// A named set of host identities, resolved by `HostGroup::resolve`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostGroups(pub HashMap<String, Vec<String>>);

/// How a Remote Executor `target` parameter may be specified.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Hosts(Vec<String>),
    Group(String),
}

impl HostGroups {
    /// Target resolution rule: array resolves to itself,
    /// a known group name resolves to its member list, anything else
    /// resolves to a single-element list.
    pub fn resolve(&self, target: &Target) -> Vec<String> {
        match target {
            Target::Hosts(hosts) => hosts.clone(),
            Target::Group(name) => match self.0.get(name) {
                Some(members) => members.clone(),
                None => vec![name.clone()],
            },
        }
    }
}

/// The result of running one command against one host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub host: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

/// Aggregate result of a fan-out execution across a target set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<ExecutionResult>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub overall_success: bool,
}

impl BatchResult {
    pub fn from_results(results: Vec<ExecutionResult>) -> Self {
        let total = results.len();
        let succeeded = results.iter().filter(|r| r.success).count();
        let failed = total - succeeded;
        Self {
            overall_success: failed == 0,
            results,
            total,
            succeeded,
            failed,
        }
    }
}

/// Disk mount usage sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskMount {
    pub device: String,
    pub mount: String,
    pub percentage: f64,
}

/// Memory usage breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryUsage {
    pub total: f64,
    pub used: f64,
    pub free: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub name: String,
    pub url: String,
    pub status: HealthStatus,
    pub latency_ms: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub cpu: f64,
    pub memory: MemoryUsage,
    pub disk: Vec<DiskMount>,
}

/// A point-in-time snapshot the Alert Pipeline evaluates. Treated as opaque
/// beyond the named fields it reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub system: SystemSnapshot,
    pub healthchecks: Vec<HealthCheckResult>,
}

/// Per-metric warning/critical threshold pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

/// Thresholds for every metric the pipeline evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub cpu_usage: Threshold,
    pub memory_usage: Threshold,
    pub disk_usage: Threshold,
    pub api_latency_ms: Threshold,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            cpu_usage: Threshold {
                warning: 70.0,
                critical: 90.0,
            },
            memory_usage: Threshold {
                warning: 75.0,
                critical: 90.0,
            },
            disk_usage: Threshold {
                warning: 80.0,
                critical: 95.0,
            },
            api_latency_ms: Threshold {
                warning: 500.0,
                critical: 2000.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Critical,
    High,
    Medium,
    Low,
}

/// One emitted alert. `shouldAutoHeal` is computed once at emission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub level: AlertLevel,
    pub message: String,
    pub metadata: HashMap<String, String>,
    pub should_auto_heal: bool,
}

impl Alert {
    pub fn dedup_key(&self) -> String {
        format!("{}-{}", self.metric, level_str(self.level))
    }
}

pub fn level_str(level: AlertLevel) -> &'static str {
    match level {
        AlertLevel::Critical => "critical",
        AlertLevel::High => "high",
        AlertLevel::Medium => "medium",
        AlertLevel::Low => "low",
    }
}

/// A named, ordered remediation sequence with an optional precondition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    pub condition: Option<String>,
    pub actions: Vec<String>,
}

/// A value already validated against the declared context schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContextValue {
    Number(f64),
    Text(String),
}

pub type Context = HashMap<String, ContextValue>;

/// The record of one attempted playbook action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// The outcome of one `heal()` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealResult {
    pub success: bool,
    pub scenario: String,
    pub playbook: Option<String>,
    pub actions: Vec<ActionRecord>,
    pub incident_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub reason: Option<String>,
    pub report_path: Option<String>,
}

/// An immutable record of a completed (or failed) heal invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub scenario: String,
    pub playbook: Option<String>,
    pub context: Context,
    pub actions: Vec<ActionRecord>,
    pub success: bool,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub report_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Replace,
    Insert,
    Wrap,
}

/// An issue report fed into the Patch Generator: its classification, the
/// evidence strings pattern-matching runs against, and the source files to
/// scan for fix locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub issue_type: String,
    pub evidence: Vec<String>,
    pub files: HashMap<String, String>,
}

/// One source-file mutation produced by the Patch Generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub line: usize,
    pub before: String,
    pub after: String,
}

/// A generated, file-scoped fix for one detected issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patch {
    pub id: String,
    pub issue_type: String,
    pub pattern: String,
    pub files: HashMap<String, Vec<Change>>,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStrategy {
    Canary,
    BlueGreen,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    InProgress,
    Success,
    Failed,
}

/// Observed metric averages sampled during a stage's monitoring window.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageMetrics {
    pub error_rate: f64,
    pub response_time_ms: f64,
    pub cpu: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub name: String,
    pub percentage: u8,
    pub status: StageStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub observed: Option<StageMetrics>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Completed,
    Failed,
    RolledBack,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub patch_id: String,
    pub repository: String,
    pub strategy: DeployStrategy,
    pub stages: Vec<StageResult>,
    pub status: DeploymentStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The outcome of restoring one stage during a rollback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoredStage {
    pub stage: String,
    pub backup_dir: Option<String>,
    pub service_restarted: bool,
    pub healthy: bool,
}

/// The record returned by the Rollback Engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackRecord {
    pub deployment_id: String,
    pub reason: String,
    pub partial: bool,
    pub restored: Vec<RestoredStage>,
    pub success: bool,
    pub dry_run: bool,
    pub timestamp: DateTime<Utc>,
}

/// A locally cached mapping from dedup key to the remote issue it created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub issue_key: String,
    pub dedup_key: String,
    pub created_at: DateTime<Utc>,
}

/// A pending Remote Executor approval request (an extension
/// point: this crate exposes the hook, not a UI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub id: u64,
    pub description: String,
    pub command: String,
    pub requested_at: DateTime<Utc>,
    pub decision: ApprovalDecision,
}

/// The per-task outcome recorded in one heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task: String,
    pub success: bool,
    pub error: Option<String>,
}

/// The summary produced by one Orchestrator heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatSummary {
    pub timestamp: DateTime<Utc>,
    pub run_count: u64,
    pub tasks_executed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<TaskOutcome>,
}

/// One row of the Remote Executor's bounded audit ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub host: String,
    pub command: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}
