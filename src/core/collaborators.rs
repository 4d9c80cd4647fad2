// src/core/collaborators.rs

//! Contracts for components that are explicitly out of scope for this
//! crate: the concrete metrics collectors, the log
//! parser/report renderer input, and anything else the orchestrator needs
//! to call but does not itself implement. The orchestrator depends only on
//! these traits, never on a concrete collector.

use crate::core::errors::OpsResult;
use crate::core::types::{DiskMount, Host, MemoryUsage, MetricsSnapshot, SystemSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Supplies the periodic metrics snapshot the Alert Pipeline evaluates.
/// The concrete CPU/mem/disk/health probes are collaborators; this crate
/// only defines the shape it needs from them.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn snapshot(&self) -> OpsResult<MetricsSnapshot>;
}

/// A `MetricsSource` that always reports an all-zero, healthy snapshot,
/// for tests and for deployments that do not wire a real collector.
pub struct NullMetricsSource;

#[async_trait]
impl MetricsSource for NullMetricsSource {
    async fn snapshot(&self) -> OpsResult<MetricsSnapshot> {
        Ok(MetricsSnapshot {
            timestamp: Utc::now(),
            system: SystemSnapshot {
                cpu: 0.0,
                memory: MemoryUsage {
                    total: 0.0,
                    used: 0.0,
                    free: 0.0,
                    percentage: 0.0,
                },
                disk: Vec::<DiskMount>::new(),
            },
            healthchecks: Vec::new(),
        })
    }
}

/// One log entry pulled from a host, opaque beyond timestamp/level/text.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub text: String,
}

/// The result of one log-collection pass over a host: raw lines plus any
/// derived issue counts the (out-of-scope) parser attached.
#[derive(Debug, Clone, Default)]
pub struct LogBundle {
    pub lines: Vec<LogLine>,
    pub issues_detected: usize,
    pub critical_issues: usize,
}

/// Remote log retrieval/parsing/bottleneck identification (C3). The
/// concrete implementation is a collaborator out of scope for this crate;
/// only the contract is defined here so the Orchestrator can schedule the
/// "logs" task against any implementation.
#[async_trait]
pub trait LogCollector: Send + Sync {
    async fn collect(&self, host: &Host) -> OpsResult<LogBundle>;
}

/// A `LogCollector` that always returns an empty bundle, for tests and for
/// deployments that do not wire a real collector.
pub struct NullLogCollector;

#[async_trait]
impl LogCollector for NullLogCollector {
    async fn collect(&self, _host: &Host) -> OpsResult<LogBundle> {
        Ok(LogBundle::default())
    }
}
