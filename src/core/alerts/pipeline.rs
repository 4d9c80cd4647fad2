// src/core/alerts/pipeline.rs

//! The Alert Pipeline (C4): threshold evaluation, deduplication, priority
//! and auto-heal eligibility, and side-effect dispatch (ticketing,
//! notification, auto-heal trigger request).

use super::dedup::DedupCache;
use crate::core::ticketing::TicketingAdapter;
use crate::core::types::{Alert, AlertLevel, AlertThresholds, HealthStatus, MetricsSnapshot};
use chrono::Utc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(300);

/// Metric names whose alerts are eligible for auto-heal.
const AUTO_HEAL_SUBSTRINGS: [&str; 3] = ["disk_usage", "memory_usage", "process_down"];

fn level_for(value: f64, threshold: &crate::core::types::Threshold) -> Option<AlertLevel> {
    if value >= threshold.critical {
        Some(AlertLevel::Critical)
    } else if value >= threshold.warning {
        Some(AlertLevel::High)
    } else {
        None
    }
}

fn threshold_value(level: AlertLevel, threshold: &crate::core::types::Threshold) -> f64 {
    match level {
        AlertLevel::Critical => threshold.critical,
        _ => threshold.warning,
    }
}

fn should_auto_heal(metric: &str, level: AlertLevel) -> bool {
    matches!(level, AlertLevel::Critical | AlertLevel::High)
        && AUTO_HEAL_SUBSTRINGS.iter().any(|s| metric.contains(s))
}

fn make_alert(metric: &str, value: f64, level: AlertLevel, threshold: f64, message: String) -> Alert {
    Alert {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        metric: metric.to_string(),
        value,
        threshold,
        level,
        message,
        metadata: Default::default(),
        should_auto_heal: should_auto_heal(metric, level),
    }
}

/// Evaluates one snapshot against `thresholds` in the fixed order cpu,
/// memory, disk (per mount), then healthchecks. Order matters
/// because dedup keys must be produced deterministically.
pub fn evaluate(snapshot: &MetricsSnapshot, thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(level) = level_for(snapshot.system.cpu, &thresholds.cpu_usage) {
        let threshold = threshold_value(level, &thresholds.cpu_usage);
        alerts.push(make_alert(
            "cpu_usage",
            snapshot.system.cpu,
            level,
            threshold,
            format!("CPU usage at {:.1}% exceeds threshold", snapshot.system.cpu),
        ));
    }

    if let Some(level) = level_for(snapshot.system.memory.percentage, &thresholds.memory_usage) {
        let threshold = threshold_value(level, &thresholds.memory_usage);
        alerts.push(make_alert(
            "memory_usage",
            snapshot.system.memory.percentage,
            level,
            threshold,
            format!(
                "Memory usage at {:.1}% exceeds threshold",
                snapshot.system.memory.percentage
            ),
        ));
    }

    for disk in &snapshot.system.disk {
        if let Some(level) = level_for(disk.percentage, &thresholds.disk_usage) {
            let metric = format!("disk_usage_{}", disk.mount);
            let threshold = threshold_value(level, &thresholds.disk_usage);
            alerts.push(make_alert(
                &metric,
                disk.percentage,
                level,
                threshold,
                format!(
                    "Disk usage on {} at {:.1}% exceeds threshold",
                    disk.mount, disk.percentage
                ),
            ));
        }
    }

    for check in &snapshot.healthchecks {
        match check.status {
            HealthStatus::Unhealthy => {
                alerts.push(make_alert(
                    "healthcheck_failed",
                    0.0,
                    AlertLevel::Critical,
                    0.0,
                    format!("Healthcheck '{}' is unhealthy: {}", check.name, check
                        .error
                        .clone()
                        .unwrap_or_default()),
                ));
            }
            HealthStatus::Healthy if check.latency_ms > thresholds.api_latency_ms.critical => {
                alerts.push(make_alert(
                    "api_latency",
                    check.latency_ms,
                    AlertLevel::High,
                    thresholds.api_latency_ms.critical,
                    format!(
                        "Healthcheck '{}' latency {:.0}ms exceeds threshold",
                        check.name, check.latency_ms
                    ),
                ));
            }
            HealthStatus::Healthy => {}
        }
    }

    alerts
}

/// An action the pipeline recorded while handling an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Logged,
    Notified,
    AutoHealTriggered,
}

#[derive(Debug, Clone, Default)]
pub struct HandleOptions {
    pub create_jsm_ticket: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct HandleResult {
    pub actions: Vec<Action>,
    pub auto_heal_requested: bool,
}

/// The Alert Pipeline's runtime state: the dedup cache and a handle to the
/// (best-effort) ticketing adapter.
pub struct AlertPipeline {
    dedup: DedupCache,
    thresholds: AlertThresholds,
    ticketing: Option<TicketingAdapter>,
}

impl AlertPipeline {
    pub fn new(thresholds: AlertThresholds, ticketing: Option<TicketingAdapter>) -> Self {
        Self {
            dedup: DedupCache::new(DEFAULT_DEDUP_WINDOW),
            thresholds,
            ticketing,
        }
    }

    /// Evaluates `snapshot`, suppressing alerts whose `(metric, level)` key
    /// is still within the dedup window, and records emissions.
    pub fn process(&mut self, snapshot: &MetricsSnapshot) -> Vec<Alert> {
        let now = Utc::now();
        let mut emitted = Vec::new();
        for alert in evaluate(snapshot, &self.thresholds) {
            let key = alert.dedup_key();
            if self.dedup.is_suppressed(&key, now) {
                crate::core::metrics::ALERTS_DEDUPED_TOTAL.inc();
                continue;
            }
            self.dedup.record(&key, now);
            crate::core::metrics::ALERTS_EMITTED_TOTAL
                .with_label_values(&[&alert.metric, crate::core::types::level_str(alert.level)])
                .inc();
            emitted.push(alert);
        }
        emitted
    }

    /// Handles one alert: log, (best-effort) ticket, notify on critical,
    /// and request auto-heal when eligible. Ticketing failures never
    /// propagate out of this method.
    pub async fn handle(&mut self, alert: &Alert, options: &HandleOptions) -> HandleResult {
        let mut actions = vec![Action::Logged];
        info!(metric = %alert.metric, level = ?alert.level, "alert recorded");

        if let Some(ticketing) = self.ticketing.as_mut()
            && options.create_jsm_ticket != Some(false)
        {
            if let Err(e) = ticketing.create_incident_from_alert(alert).await {
                tracing::warn!(error = %e, "ticketing dispatch failed; continuing");
            }
        }

        if alert.level == AlertLevel::Critical {
            actions.push(Action::Notified);
        }

        let auto_heal_requested = alert.should_auto_heal;
        if auto_heal_requested {
            actions.push(Action::AutoHealTriggered);
        }

        HandleResult {
            actions,
            auto_heal_requested,
        }
    }

    /// The one-shot composition the scheduler drives each heartbeat.
    pub async fn run(&mut self, snapshot: &MetricsSnapshot) -> (usize, Vec<HandleResult>) {
        let alerts = self.process(snapshot);
        let mut results = Vec::with_capacity(alerts.len());
        for alert in &alerts {
            results.push(self.handle(alert, &HandleOptions::default()).await);
        }
        (alerts.len(), results)
    }
}
