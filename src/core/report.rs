// src/core/report.rs

//! Markdown report rendering: per-incident reports (written by AutoHeal)
//! and daily/weekly operations reports (written by the Orchestrator). Built with plain `String` concatenation rather than a templating crate.

use crate::core::types::{ActionRecord, Incident};
use chrono::{DateTime, Utc};

/// Renders the markdown incident report.
pub fn render_incident_report(incident: &Incident) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Incident Report: {}\n\n", incident.id));
    out.push_str(&format!(
        "**Status:** {}\n\n",
        if incident.success {
            "✅ Resolved"
        } else {
            "❌ Failed"
        }
    ));
    out.push_str(&format!("**Scenario:** {}\n\n", incident.scenario));
    if let Some(playbook) = &incident.playbook {
        out.push_str(&format!("**Playbook:** {playbook}\n\n"));
    }
    out.push_str(&format!("**Timestamp:** {}\n\n", incident.timestamp.to_rfc3339()));
    out.push_str(&format!("**Duration:** {}ms\n\n", incident.duration_ms));

    out.push_str("## Actions\n\n");
    for (idx, action) in incident.actions.iter().enumerate() {
        render_action_section(&mut out, idx + 1, action);
    }

    if !incident.success {
        out.push_str("\n> Manual intervention may be required.\n");
    }

    out
}

fn render_action_section(out: &mut String, index: usize, action: &ActionRecord) {
    out.push_str(&format!(
        "### {index}. `{}` — {}\n\n",
        action.command,
        if action.success { "succeeded" } else { "failed" }
    ));
    if !action.stdout.is_empty() {
        out.push_str(&format!("**Stdout:**\n```\n{}\n```\n\n", action.stdout));
    }
    if !action.stderr.is_empty() {
        out.push_str(&format!("**Stderr:**\n```\n{}\n```\n\n", action.stderr));
    }
    if let Some(error) = &action.error {
        out.push_str(&format!("**Error:** {error}\n\n"));
    }
}

/// Aggregate counts the Orchestrator gathers across a reporting window to
/// drive the daily/weekly report.
#[derive(Debug, Clone, Default)]
pub struct OperationsSummary {
    pub cpu_min: f64,
    pub cpu_max: f64,
    pub cpu_avg: f64,
    pub memory_min: f64,
    pub memory_max: f64,
    pub memory_avg: f64,
    pub disk_min: f64,
    pub disk_max: f64,
    pub disk_avg: f64,
    pub incident_count: usize,
    pub incident_titles: Vec<String>,
    pub issues_detected: usize,
    pub critical_issues: usize,
}

fn recommendations(summary: &OperationsSummary) -> Vec<&'static str> {
    let mut recs = Vec::new();
    if summary.cpu_max > 90.0 {
        recs.push("🔴 CPU usage exceeded 90% during this period.");
    }
    if summary.memory_max > 90.0 {
        recs.push("🔴 Memory usage exceeded 90% during this period.");
    }
    if summary.disk_max > 85.0 {
        recs.push("🟡 Disk usage exceeded 85% during this period.");
    }
    if summary.incident_count > 5 {
        recs.push("⚠️ Incident count exceeded 5 during this period.");
    }
    if recs.is_empty() {
        recs.push("✅ All Systems Nominal");
    }
    recs
}

fn render_usage_section(out: &mut String, title: &str, min: f64, max: f64, avg: f64) {
    out.push_str(&format!("### {title}\n\n"));
    out.push_str(&format!("- Min: {min:.1}%\n"));
    out.push_str(&format!("- Max: {max:.1}%\n"));
    out.push_str(&format!("- Avg: {avg:.1}%\n\n"));
}

/// Renders the daily operations report.
pub fn render_daily_report(generated_at: DateTime<Utc>, summary: &OperationsSummary) -> String {
    render_operations_report("Daily", "Last 24 hours", generated_at, summary, 0)
}

/// Renders the weekly operations report, capping the incident list at 10.
pub fn render_weekly_report(generated_at: DateTime<Utc>, summary: &OperationsSummary) -> String {
    render_operations_report("Weekly", "Last 7 days", generated_at, summary, 10)
}

fn render_operations_report(
    kind: &str,
    period: &str,
    generated_at: DateTime<Utc>,
    summary: &OperationsSummary,
    incident_cap: usize,
) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {kind} Operations Report\n\n"));
    out.push_str(&format!("**Period:** {period}\n\n"));
    out.push_str(&format!("**Generated:** {}\n\n", generated_at.to_rfc3339()));

    out.push_str("## Executive Summary\n\n");
    out.push_str(&format!(
        "System observed {} incident(s) with {} log issue(s) detected ({} critical).\n\n",
        summary.incident_count, summary.issues_detected, summary.critical_issues
    ));

    out.push_str("## System Health\n\n");
    render_usage_section(&mut out, "CPU Usage", summary.cpu_min, summary.cpu_max, summary.cpu_avg);
    render_usage_section(
        &mut out,
        "Memory Usage",
        summary.memory_min,
        summary.memory_max,
        summary.memory_avg,
    );
    render_usage_section(&mut out, "Disk Usage", summary.disk_min, summary.disk_max, summary.disk_avg);

    if summary.incident_count == 0 {
        out.push_str("## Incidents (0)\n\nNo incidents in the last 24 hours.\n\n");
    } else {
        out.push_str(&format!("## Incidents ({})\n\n", summary.incident_count));
        let titles = if incident_cap > 0 {
            &summary.incident_titles[..summary.incident_titles.len().min(incident_cap)]
        } else {
            &summary.incident_titles[..]
        };
        for title in titles {
            out.push_str(&format!("- {title}\n"));
        }
        out.push('\n');
    }

    out.push_str("## Log Analysis Summary\n\n");
    out.push_str(&format!("**Total Issues Detected:** {}\n\n", summary.issues_detected));
    out.push_str(&format!("**Critical Issues:** {}\n\n", summary.critical_issues));

    out.push_str("## Recommendations\n\n");
    for rec in recommendations(summary) {
        out.push_str(&format!("- {rec}\n"));
    }

    out
}
