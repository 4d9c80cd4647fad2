// src/core/orchestrator/mod.rs

//! The Orchestrator (C10): the heartbeat loop driving metrics collection,
//! log collection, alert evaluation, and daily/weekly report generation,
//! each in its own failure domain.

mod schedule;

use crate::core::errors::OpsResult;
use crate::core::types::{HeartbeatSummary, TaskOutcome};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// One scheduled task the heartbeat may run. Implementations own whatever
/// collaborator (metrics source, log collector, alert pipeline) they wrap.
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self) -> OpsResult<()>;
}

/// The report-generation task: evaluated each heartbeat, but only
/// actually renders and writes a report when the Orchestrator's schedule
/// says one is due. `due` is computed by the caller from `ScheduleState`;
/// implementations must no-op when it's `false`.
#[async_trait]
pub trait ReportTask: Send + Sync {
    async fn maybe_emit_daily(&self, due: bool) -> OpsResult<()>;
    async fn maybe_emit_weekly(&self, due: bool) -> OpsResult<()>;
}

#[derive(Default)]
struct ScheduleState {
    last_metrics: Option<chrono::DateTime<Utc>>,
    last_logs: Option<chrono::DateTime<Utc>>,
    last_alerts: Option<chrono::DateTime<Utc>>,
    last_daily_report: Option<NaiveDate>,
    last_weekly_report: Option<NaiveDate>,
}

/// The Orchestrator. Drives the schedule table and owns the three
/// interval tasks plus the report task.
pub struct Orchestrator {
    metrics_task: Arc<dyn Task>,
    logs_task: Arc<dyn Task>,
    alerts_task: Arc<dyn Task>,
    report_task: Arc<dyn ReportTask>,
    schedule: Mutex<ScheduleState>,
    run_count: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        metrics_task: Arc<dyn Task>,
        logs_task: Arc<dyn Task>,
        alerts_task: Arc<dyn Task>,
        report_task: Arc<dyn ReportTask>,
    ) -> Self {
        Self {
            metrics_task,
            logs_task,
            alerts_task,
            report_task,
            schedule: Mutex::new(ScheduleState::default()),
            run_count: AtomicU64::new(0),
        }
    }

    fn due_tasks(&self, now: chrono::DateTime<Utc>) -> Vec<Arc<dyn Task>> {
        let schedule = self.schedule.lock();
        let mut due = Vec::new();
        if schedule::is_due(schedule.last_metrics, now, schedule::METRICS_INTERVAL) {
            due.push(self.metrics_task.clone());
        }
        if schedule::is_due(schedule.last_logs, now, schedule::LOGS_INTERVAL) {
            due.push(self.logs_task.clone());
        }
        if schedule::is_due(schedule.last_alerts, now, schedule::ALERTS_INTERVAL) {
            due.push(self.alerts_task.clone());
        }
        due
    }

    fn record_ran(&self, task_name: &str, now: chrono::DateTime<Utc>) {
        let mut schedule = self.schedule.lock();
        match task_name {
            "metrics" => schedule.last_metrics = Some(now),
            "logs" => schedule.last_logs = Some(now),
            "alerts" => schedule.last_alerts = Some(now),
            _ => {}
        }
    }

    /// Runs one heartbeat: composes the due task list, always evaluates
    /// report generation, runs everything concurrently with isolated
    /// failure domains, and returns the aggregate summary.
    pub async fn heartbeat(&self) -> HeartbeatSummary {
        let timer = crate::core::metrics::HEARTBEAT_DURATION_SECONDS.start_timer();
        let now = Utc::now();
        let run_count = self.run_count.fetch_add(1, Ordering::SeqCst) + 1;
        crate::core::metrics::HEARTBEATS_TOTAL.inc();

        let due = self.due_tasks(now);
        let (daily_due, weekly_due) = {
            let schedule = self.schedule.lock();
            (
                schedule::should_emit_daily(schedule.last_daily_report, now),
                schedule::should_emit_weekly(schedule.last_weekly_report, schedule.last_daily_report, now),
            )
        };

        let mut set: JoinSet<(String, OpsResult<()>)> = JoinSet::new();
        for task in &due {
            let task = task.clone();
            set.spawn(async move {
                let name = task.name().to_string();
                let outcome = task.run().await;
                (name, outcome)
            });
        }

        {
            let report_task = self.report_task.clone();
            set.spawn(async move {
                let daily = report_task.maybe_emit_daily(daily_due).await;
                let weekly = report_task.maybe_emit_weekly(weekly_due).await;
                let combined = daily.and(weekly);
                ("reports".to_string(), combined)
            });
        }

        let mut results = Vec::new();
        let mut reports_succeeded = false;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    info!(task = %name, "heartbeat task completed");
                    self.record_ran(&name, now);
                    if name == "reports" {
                        reports_succeeded = true;
                    }
                    results.push(TaskOutcome {
                        task: name,
                        success: true,
                        error: None,
                    });
                }
                Ok((name, Err(e))) => {
                    warn!(task = %name, error = %e, "heartbeat task failed");
                    crate::core::metrics::TASK_FAILURES_TOTAL.with_label_values(&[&name]).inc();
                    results.push(TaskOutcome {
                        task: name,
                        success: false,
                        error: Some(e.to_string()),
                    });
                }
                Err(join_err) => {
                    error!(error = %join_err, "heartbeat task panicked");
                    results.push(TaskOutcome {
                        task: "unknown".to_string(),
                        success: false,
                        error: Some(join_err.to_string()),
                    });
                }
            }
        }

        if reports_succeeded {
            let mut schedule = self.schedule.lock();
            if daily_due {
                schedule.last_daily_report = Some(now.date_naive());
            }
            if weekly_due {
                schedule.last_weekly_report = Some(now.date_naive());
            }
        }

        timer.observe_duration();
        let successful = results.iter().filter(|r| r.success).count();
        let failed = results.len() - successful;
        HeartbeatSummary {
            timestamp: now,
            run_count,
            tasks_executed: results.len(),
            successful,
            failed,
            results,
        }
    }

    /// Runs one immediate heartbeat, then schedules recurring heartbeats
    /// every `interval`. Per-tick panics/errors are caught and logged; the
    /// recurring schedule survives them.
    pub async fn start(self: Arc<Self>, interval: Duration) {
        self.heartbeat().await;
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let summary = self.heartbeat().await;
            if summary.failed > 0 {
                warn!(failed = summary.failed, "heartbeat completed with failures");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingTask {
        name: &'static str,
        calls: std::sync::atomic::AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Task for CountingTask {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn run(&self) -> OpsResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(crate::core::errors::OpsError::RemoteFailure("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct NoopReportTask;
    #[async_trait]
    impl ReportTask for NoopReportTask {
        async fn maybe_emit_daily(&self, _due: bool) -> OpsResult<()> {
            Ok(())
        }
        async fn maybe_emit_weekly(&self, _due: bool) -> OpsResult<()> {
            Ok(())
        }
    }

    fn orchestrator(alerts_fail: bool) -> Orchestrator {
        Orchestrator::new(
            Arc::new(CountingTask {
                name: "metrics",
                calls: std::sync::atomic::AtomicUsize::new(0),
                fail: false,
            }),
            Arc::new(CountingTask {
                name: "logs",
                calls: std::sync::atomic::AtomicUsize::new(0),
                fail: false,
            }),
            Arc::new(CountingTask {
                name: "alerts",
                calls: std::sync::atomic::AtomicUsize::new(0),
                fail: alerts_fail,
            }),
            Arc::new(NoopReportTask),
        )
    }

    #[tokio::test]
    async fn first_heartbeat_runs_every_interval_task() {
        let orch = orchestrator(false);
        let summary = orch.heartbeat().await;
        assert_eq!(summary.run_count, 1);
        assert_eq!(summary.tasks_executed, 4); // metrics, logs, alerts, reports
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn second_immediate_heartbeat_runs_nothing_but_reports() {
        let orch = orchestrator(false);
        orch.heartbeat().await;
        let summary = orch.heartbeat().await;
        assert_eq!(summary.run_count, 2);
        assert_eq!(summary.tasks_executed, 1);
    }

    // invariant 8
    #[tokio::test]
    async fn one_failing_task_does_not_abort_the_others() {
        let orch = orchestrator(true);
        let summary = orch.heartbeat().await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.successful, 3);
    }
}
