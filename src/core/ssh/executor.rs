// src/core/ssh/executor.rs

//! The Remote Executor (C2): target/group resolution, command policy,
//! parallel or sequential fan-out, and a bounded audit trail.

use super::policy::{self, Allowlist, PolicyDecision};
use crate::core::errors::OpsError;
use crate::core::pool::ConnectionPool;
use crate::core::types::{
    ApprovalDecision, ApprovalRequest, AuditEntry, BatchResult, ExecutionResult, Host, HostGroups,
    Target,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);
const AUDIT_CAPACITY: usize = 1000;
const AUDIT_STATUS_WINDOW: usize = 10;

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub parallel: bool,
    pub dry_run: bool,
    pub require_approval: bool,
    pub timeout: Option<Duration>,
}

/// Resolves hosts from a fleet inventory keyed by identity.
pub struct Inventory {
    pub hosts: HashMap<String, Host>,
    pub groups: HostGroups,
}

/// The Remote Executor. Holds the connection pool it borrows from, the
/// command policy, a monotonic approval-request id source, and a bounded
/// audit ring buffer.
pub struct RemoteExecutor {
    pool: Arc<ConnectionPool>,
    allowlist: Allowlist,
    approval_seq: AtomicU64,
    approvals: Mutex<HashMap<u64, ApprovalRequest>>,
    audit: Mutex<VecDeque<AuditEntry>>,
}

impl RemoteExecutor {
    pub fn new(pool: Arc<ConnectionPool>, allowlist: Allowlist) -> Self {
        Self {
            pool,
            allowlist,
            approval_seq: AtomicU64::new(1),
            approvals: Mutex::new(HashMap::new()),
            audit: Mutex::new(VecDeque::with_capacity(AUDIT_CAPACITY)),
        }
    }

    /// Registers a pending approval request; deny-by-default until an
    /// external actor flips the decision via `record_decision`. This is
    /// an extension point for an external approver, not a UI.
    pub fn request_approval(&self, description: String, command: String) -> u64 {
        let id = self.approval_seq.fetch_add(1, Ordering::SeqCst);
        self.approvals.lock().insert(
            id,
            ApprovalRequest {
                id,
                description,
                command,
                requested_at: Utc::now(),
                decision: ApprovalDecision::Pending,
            },
        );
        id
    }

    pub fn record_decision(&self, id: u64, approved: bool) {
        if let Some(req) = self.approvals.lock().get_mut(&id) {
            req.decision = if approved {
                ApprovalDecision::Approved
            } else {
                ApprovalDecision::Denied
            };
        }
    }

    fn decision_of(&self, id: u64) -> ApprovalDecision {
        self.approvals
            .lock()
            .get(&id)
            .map(|r| r.decision)
            .unwrap_or(ApprovalDecision::Pending)
    }

    /// Returns the most recent `AUDIT_STATUS_WINDOW` audit entries.
    pub fn status(&self) -> Vec<AuditEntry> {
        let audit = self.audit.lock();
        audit
            .iter()
            .rev()
            .take(AUDIT_STATUS_WINDOW)
            .cloned()
            .collect()
    }

    fn audit(&self, entry: AuditEntry) {
        let mut audit = self.audit.lock();
        if audit.len() == AUDIT_CAPACITY {
            audit.pop_front();
        }
        audit.push_back(entry);
    }

    /// Runs `command` against every host resolved from `target`.
    pub async fn execute(
        &self,
        inventory: &Inventory,
        target: &Target,
        command: &str,
        options: &ExecOptions,
    ) -> BatchResult {
        let host_ids = inventory.groups.resolve(target);

        let decision = policy::evaluate(command, &self.allowlist, options.require_approval);
        if decision == PolicyDecision::Deny {
            let results = host_ids
                .iter()
                .map(|h| self.denied_result(h, "command denied by policy"))
                .collect();
            return BatchResult::from_results(results);
        }

        if options.require_approval {
            let id = self.request_approval(format!("execute on {host_ids:?}"), command.to_string());
            if self.decision_of(id) != ApprovalDecision::Approved {
                let results = host_ids
                    .iter()
                    .map(|h| self.denied_result(h, "awaiting approval"))
                    .collect();
                return BatchResult::from_results(results);
            }
        }

        if options.dry_run {
            let results = host_ids
                .iter()
                .map(|h| ExecutionResult {
                    host: h.clone(),
                    success: true,
                    exit_code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                    duration_ms: 0,
                    timestamp: Utc::now(),
                    error: None,
                })
                .collect();
            return BatchResult::from_results(results);
        }

        let timeout = options.timeout.unwrap_or(DEFAULT_EXEC_TIMEOUT);

        let results = if options.parallel {
            let futures = host_ids.iter().map(|host_id| {
                self.execute_one(inventory, host_id, command, timeout)
            });
            futures::future::join_all(futures).await
        } else {
            let mut results = Vec::with_capacity(host_ids.len());
            for host_id in &host_ids {
                results.push(self.execute_one(inventory, host_id, command, timeout).await);
            }
            results
        };

        for result in &results {
            self.audit(AuditEntry {
                host: result.host.clone(),
                command: command.to_string(),
                success: result.success,
                timestamp: result.timestamp,
            });
        }

        BatchResult::from_results(results)
    }

    fn denied_result(&self, host_id: &str, reason: &str) -> ExecutionResult {
        warn!(host = %host_id, reason, "remote execution denied");
        ExecutionResult {
            host: host_id.clone().to_string(),
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms: 0,
            timestamp: Utc::now(),
            error: Some(reason.to_string()),
        }
    }

    async fn execute_one(
        &self,
        inventory: &Inventory,
        host_id: &str,
        command: &str,
        timeout: Duration,
    ) -> ExecutionResult {
        let started = Instant::now();
        let timestamp = Utc::now();

        let Some(host) = inventory.hosts.get(&host_id.to_lowercase()) else {
            return ExecutionResult {
                host: host_id.to_string(),
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 0,
                timestamp,
                error: Some(format!("unknown host '{host_id}'")),
            };
        };

        let run = async {
            let entry = self.pool.acquire(host).await?;
            let mut guard = entry.lock().await;
            let outcome = guard.session.exec(command).await;
            drop(guard);
            self.pool.release(&host.key()).await;
            outcome
        };

        match tokio::time::timeout(timeout, run).await {
            Ok(Ok((exit_code, stdout, stderr))) => ExecutionResult {
                host: host_id.to_string(),
                success: exit_code == Some(0),
                exit_code,
                stdout,
                stderr,
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp,
                error: None,
            },
            Ok(Err(e)) => ExecutionResult {
                host: host_id.to_string(),
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp,
                error: Some(e.to_string()),
            },
            Err(_) => ExecutionResult {
                host: host_id.to_string(),
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: started.elapsed().as_millis() as u64,
                timestamp,
                error: Some(OpsError::Timeout(format!("exec on {host_id}")).to_string()),
            },
        }
    }
}
