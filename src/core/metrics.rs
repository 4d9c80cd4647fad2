// src/core/metrics.rs

//! Defines and registers Prometheus metrics for the operations engine.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only
//! once globally for the entire process lifetime.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
};

lazy_static! {
    // --- Orchestrator ---
    /// The number of heartbeats the orchestrator has run.
    pub static ref HEARTBEATS_TOTAL: Counter =
        register_counter!("opsd_heartbeats_total", "Total number of orchestrator heartbeats run.").unwrap();
    /// Task failures within a heartbeat, labeled by task name.
    pub static ref TASK_FAILURES_TOTAL: CounterVec =
        register_counter_vec!("opsd_task_failures_total", "Total number of task failures, labeled by task name.", &["task"]).unwrap();
    /// Wall-clock time spent running one heartbeat.
    pub static ref HEARTBEAT_DURATION_SECONDS: Histogram =
        register_histogram!("opsd_heartbeat_duration_seconds", "Time spent running one heartbeat.").unwrap();

    // --- Alert pipeline ---
    /// Alerts emitted, labeled by metric and level.
    pub static ref ALERTS_EMITTED_TOTAL: CounterVec =
        register_counter_vec!("opsd_alerts_emitted_total", "Total number of alerts emitted.", &["metric", "level"]).unwrap();
    /// Alerts suppressed because they fell within the dedup window.
    pub static ref ALERTS_DEDUPED_TOTAL: Counter =
        register_counter!("opsd_alerts_deduped_total", "Total number of alerts suppressed by deduplication.").unwrap();

    // --- AutoHeal ---
    /// AutoHeal invocations, labeled by scenario and outcome (success|failure).
    pub static ref HEALS_TOTAL: CounterVec =
        register_counter_vec!("opsd_heals_total", "Total number of AutoHeal invocations.", &["scenario", "outcome"]).unwrap();

    // --- Connection pool ---
    /// Current number of live entries in the connection pool.
    pub static ref POOL_SIZE: Gauge =
        register_gauge!("opsd_pool_size", "Number of live entries in the connection pool.").unwrap();
    /// Current number of pool entries checked out.
    pub static ref POOL_IN_USE: Gauge =
        register_gauge!("opsd_pool_in_use", "Number of connection pool entries currently in use.").unwrap();

    // --- Remote executor ---
    /// Remote command executions, labeled by outcome (success|failure|timeout|denied).
    pub static ref REMOTE_EXEC_TOTAL: CounterVec =
        register_counter_vec!("opsd_remote_exec_total", "Total remote command executions.", &["outcome"]).unwrap();

    // --- Deploy / rollback ---
    /// Deployments, labeled by strategy and terminal status.
    pub static ref DEPLOYMENTS_TOTAL: CounterVec =
        register_counter_vec!("opsd_deployments_total", "Total deployments, labeled by strategy and terminal status.", &["strategy", "status"]).unwrap();
    /// Rollbacks performed, labeled by outcome.
    pub static ref ROLLBACKS_TOTAL: CounterVec =
        register_counter_vec!("opsd_rollbacks_total", "Total rollbacks performed.", &["outcome"]).unwrap();
    /// Observed error rate during the most recent stage metric sample, labeled by stage name.
    pub static ref STAGE_ERROR_RATE: GaugeVec =
        register_gauge_vec!("opsd_stage_error_rate", "Observed error rate for the most recent deploy stage sample.", &["stage"]).unwrap();

    // --- Ticketing ---
    /// Ticketing operations, labeled by action (create|comment|transition|close).
    pub static ref TICKETS_TOTAL: CounterVec =
        register_counter_vec!("opsd_tickets_total", "Total ticketing operations.", &["action"]).unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
