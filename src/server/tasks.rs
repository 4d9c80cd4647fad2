// src/server/tasks.rs

//! Concrete `Task`/`ReportTask` wiring that feeds the Orchestrator's four
//! scheduled slots: metrics collection, log collection, alert evaluation,
//! and daily/weekly report generation. Each task owns the collaborators it
//! needs and keeps its own failure domain.

use crate::core::alerts::AlertPipeline;
use crate::core::autoheal::AutoHealExecutor;
use crate::core::collaborators::{LogCollector, MetricsSource};
use crate::core::errors::{OpsError, OpsResult};
use crate::core::orchestrator::{ReportTask, Task};
use crate::core::report::{self, OperationsSummary};
use crate::core::ssh::executor::Inventory;
use crate::core::types::{Context, ContextValue};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, warn};

/// Running min/max/avg accumulators plus incident/issue counters, reset
/// whenever a report is emitted for the window it covers.
#[derive(Default)]
pub(crate) struct SummaryAccumulator {
    cpu: Vec<f64>,
    memory: Vec<f64>,
    disk: Vec<f64>,
    incident_titles: Vec<String>,
    issues_detected: usize,
    critical_issues: usize,
}

fn stats(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    (min, max, avg)
}

impl SummaryAccumulator {
    fn snapshot_and_reset(&mut self) -> OperationsSummary {
        let (cpu_min, cpu_max, cpu_avg) = stats(&self.cpu);
        let (memory_min, memory_max, memory_avg) = stats(&self.memory);
        let (disk_min, disk_max, disk_avg) = stats(&self.disk);
        let summary = OperationsSummary {
            cpu_min,
            cpu_max,
            cpu_avg,
            memory_min,
            memory_max,
            memory_avg,
            disk_min,
            disk_max,
            disk_avg,
            incident_count: self.incident_titles.len(),
            incident_titles: self.incident_titles.clone(),
            issues_detected: self.issues_detected,
            critical_issues: self.critical_issues,
        };
        *self = SummaryAccumulator::default();
        summary
    }
}

/// The "metrics" task: samples the configured `MetricsSource` and folds the
/// reading into the running operations-summary accumulator. Alert
/// evaluation is driven separately by `AlertsTask` on its own interval.
pub struct MetricsTask {
    source: Arc<dyn MetricsSource>,
    accumulator: Arc<Mutex<SummaryAccumulator>>,
}

impl MetricsTask {
    pub fn new(source: Arc<dyn MetricsSource>, accumulator: Arc<Mutex<SummaryAccumulator>>) -> Self {
        Self { source, accumulator }
    }
}

#[async_trait]
impl Task for MetricsTask {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn run(&self) -> OpsResult<()> {
        let snapshot = self.source.snapshot().await?;
        let mut acc = self.accumulator.lock();
        acc.cpu.push(snapshot.system.cpu);
        acc.memory.push(snapshot.system.memory.percentage);
        if let Some(worst) = snapshot
            .system
            .disk
            .iter()
            .map(|d| d.percentage)
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        {
            acc.disk.push(worst);
        }
        Ok(())
    }
}

/// The "logs" task: collects one log bundle per inventory host and folds
/// the issue counts into the accumulator. A single host's collection
/// failure is logged and does not abort the others.
pub struct LogsTask {
    collector: Arc<dyn LogCollector>,
    inventory: Arc<Inventory>,
    accumulator: Arc<Mutex<SummaryAccumulator>>,
}

impl LogsTask {
    pub fn new(
        collector: Arc<dyn LogCollector>,
        inventory: Arc<Inventory>,
        accumulator: Arc<Mutex<SummaryAccumulator>>,
    ) -> Self {
        Self {
            collector,
            inventory,
            accumulator,
        }
    }
}

#[async_trait]
impl Task for LogsTask {
    fn name(&self) -> &'static str {
        "logs"
    }

    async fn run(&self) -> OpsResult<()> {
        let mut any_ok = self.inventory.hosts.is_empty();
        for host in self.inventory.hosts.values() {
            match self.collector.collect(host).await {
                Ok(bundle) => {
                    any_ok = true;
                    let mut acc = self.accumulator.lock();
                    acc.issues_detected += bundle.issues_detected;
                    acc.critical_issues += bundle.critical_issues;
                }
                Err(e) => warn!(host = %host.id, error = %e, "log collection failed for host"),
            }
        }
        if any_ok {
            Ok(())
        } else {
            Err(OpsError::RemoteFailure("log collection failed for every host".to_string()))
        }
    }
}

fn scenario_for_metric(metric: &str) -> Option<&'static str> {
    if metric.starts_with("disk_usage") {
        Some("disk_space_low")
    } else if metric == "memory_usage" {
        Some("memory_leak")
    } else if metric == "process_down" {
        Some("process_down")
    } else {
        None
    }
}

fn context_for_alert(metric: &str, value: f64) -> Context {
    let mut context = HashMap::new();
    if metric.starts_with("disk_usage") {
        context.insert("disk_usage".to_string(), ContextValue::Number(value));
    } else if metric == "memory_usage" {
        context.insert("memory_usage".to_string(), ContextValue::Number(value));
    }
    context
}

/// The "alerts" task: samples metrics via the same `MetricsSource`, runs
/// the Alert Pipeline's one-shot composition, and spawns an AutoHeal
/// invocation for every alert the pipeline flagged eligible. The heal
/// invocation is delegated, not awaited, by the handler that requested it.
pub struct AlertsTask {
    source: Arc<dyn MetricsSource>,
    pipeline: Arc<Mutex<AlertPipeline>>,
    autoheal: Arc<AutoHealExecutor>,
    incident_titles: Arc<Mutex<SummaryAccumulator>>,
}

impl AlertsTask {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        pipeline: Arc<Mutex<AlertPipeline>>,
        autoheal: Arc<AutoHealExecutor>,
        accumulator: Arc<Mutex<SummaryAccumulator>>,
    ) -> Self {
        Self {
            source,
            pipeline,
            autoheal,
            incident_titles: accumulator,
        }
    }
}

#[async_trait]
impl Task for AlertsTask {
    fn name(&self) -> &'static str {
        "alerts"
    }

    async fn run(&self) -> OpsResult<()> {
        let snapshot = self.source.snapshot().await?;
        let alerts = self.pipeline.lock().process(&snapshot);

        for alert in &alerts {
            let mut pipeline = self.pipeline.lock();
            let result = pipeline.handle(alert, &Default::default()).await;
            drop(pipeline);

            if result.auto_heal_requested {
                let Some(scenario) = scenario_for_metric(&alert.metric) else {
                    continue;
                };
                let context = context_for_alert(&alert.metric, alert.value);
                let autoheal = self.autoheal.clone();
                let scenario = scenario.to_string();
                let titles = self.incident_titles.clone();
                let alert_message = alert.message.clone();
                tokio::spawn(async move {
                    let outcome = autoheal.heal(&scenario, &context).await;
                    if !outcome.success {
                        error!(scenario = %scenario, reason = ?outcome.reason, "autoheal invocation failed");
                    }
                    titles.lock().incident_titles.push(alert_message);
                });
            }
        }
        Ok(())
    }
}

/// The report task: writes the rendered daily/weekly markdown to disk and
/// resets the accumulator window, mirroring AutoHeal's incident-report
/// write pattern.
pub struct FileReportTask {
    accumulator: Arc<Mutex<SummaryAccumulator>>,
    directory: String,
}

impl FileReportTask {
    pub fn new(accumulator: Arc<Mutex<SummaryAccumulator>>, directory: impl Into<String>) -> Self {
        Self {
            accumulator,
            directory: directory.into(),
        }
    }

    async fn write(&self, name: &str, rendered: String) -> OpsResult<()> {
        let path = format!("{}/{name}", self.directory);
        tokio::fs::write(&path, rendered).await?;
        Ok(())
    }
}

#[async_trait]
impl ReportTask for FileReportTask {
    async fn maybe_emit_daily(&self, due: bool) -> OpsResult<()> {
        if !due {
            return Ok(());
        }
        let now = Utc::now();
        let summary = self.accumulator.lock().snapshot_and_reset();
        let rendered = report::render_daily_report(now, &summary);
        self.write(&format!("daily-{}.md", now.format("%Y-%m-%d")), rendered).await
    }

    async fn maybe_emit_weekly(&self, due: bool) -> OpsResult<()> {
        if !due {
            return Ok(());
        }
        let now = Utc::now();
        let summary = self.accumulator.lock().snapshot_and_reset();
        let rendered = report::render_weekly_report(now, &summary);
        self.write(&format!("weekly-{}.md", now.format("%Y-%W")), rendered).await
    }
}
