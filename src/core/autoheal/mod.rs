// src/core/autoheal/mod.rs

//! The AutoHeal Executor (C5): playbook lookup, condition evaluation,
//! context/input validation, command sanitization, sequential execution,
//! and incident-report generation.

mod condition;
mod sanitize;
mod validation;

use crate::core::report;
use crate::core::types::{ActionRecord, Context, HealResult, Incident, Playbook};
use chrono::Utc;
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{info, warn};

const ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs one already-sanitized shell command and reports its outcome. A
/// trait so tests can substitute a fake runner instead of spawning a real
/// shell.
#[async_trait::async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, command: &str) -> (bool, String, String, Option<String>);
}

/// Spawns `/bin/sh -c <command>`, bounded by `ACTION_TIMEOUT`.
pub struct ShellRunner;

#[async_trait::async_trait]
impl ActionRunner for ShellRunner {
    async fn run(&self, command: &str) -> (bool, String, String, Option<String>) {
        let run = Command::new("/bin/sh").arg("-c").arg(command).output();
        match timeout(ACTION_TIMEOUT, run).await {
            Ok(Ok(output)) => (
                output.status.success(),
                String::from_utf8_lossy(&output.stdout).to_string(),
                String::from_utf8_lossy(&output.stderr).to_string(),
                None,
            ),
            Ok(Err(e)) => (false, String::new(), String::new(), Some(e.to_string())),
            Err(_) => (
                false,
                String::new(),
                String::new(),
                Some(format!("action timed out after {}s", ACTION_TIMEOUT.as_secs())),
            ),
        }
    }
}

/// The AutoHeal Executor. Holds the configured playbooks (in insertion
/// order, for the condition-match fallback) and the monotonic incident id
/// source.
pub struct AutoHealExecutor<R: ActionRunner = ShellRunner> {
    playbooks: Vec<(String, Playbook)>,
    runner: R,
    incident_seq: AtomicU64,
}

fn failure(scenario: &str, reason: impl Into<String>, started: Instant) -> HealResult {
    HealResult {
        success: false,
        scenario: scenario.to_string(),
        playbook: None,
        actions: Vec::new(),
        incident_id: None,
        timestamp: Utc::now(),
        duration_ms: started.elapsed().as_millis() as u64,
        reason: Some(reason.into()),
        report_path: None,
    }
}

impl AutoHealExecutor<ShellRunner> {
    pub fn new(playbooks: IndexMap<String, Playbook>) -> Self {
        Self::with_runner(playbooks, ShellRunner)
    }
}

impl<R: ActionRunner> AutoHealExecutor<R> {
    pub fn with_runner(playbooks: IndexMap<String, Playbook>, runner: R) -> Self {
        Self {
            playbooks: playbooks.into_iter().collect(),
            runner,
            incident_seq: AtomicU64::new(1),
        }
    }

    fn next_incident_id(&self) -> String {
        format!("heal-{}", self.incident_seq.fetch_add(1, Ordering::SeqCst))
    }

    /// Selects a playbook: direct scenario match first,
    /// then the first (by insertion order) whose condition evaluates true.
    fn select_playbook(&self, scenario: &str, context: &Context) -> Option<&Playbook> {
        if let Some((_, playbook)) = self.playbooks.iter().find(|(name, _)| name == scenario) {
            return Some(playbook);
        }
        self.playbooks
            .iter()
            .find(|(_, p)| {
                p.condition
                    .as_deref()
                    .map(|cond| condition::evaluate(cond, context))
                    .unwrap_or(false)
            })
            .map(|(_, p)| p)
    }

    /// Runs a playbook's actions sequentially against `context`, stopping
    /// at the first failure.
    async fn run_actions(&self, playbook: &Playbook, context: &Context) -> (bool, Vec<ActionRecord>) {
        let mut records = Vec::with_capacity(playbook.actions.len());
        for template in &playbook.actions {
            let command = sanitize::instantiate(template, context);

            if let Err(reason) = sanitize::sanitize(&command) {
                warn!(command = %command, reason = %reason, "autoheal action rejected by sanitizer");
                records.push(ActionRecord {
                    command,
                    success: false,
                    stdout: String::new(),
                    stderr: String::new(),
                    error: Some(reason),
                    duration_ms: 0,
                });
                return (false, records);
            }

            let started = Instant::now();
            let (success, stdout, stderr, error) = self.runner.run(&command).await;
            records.push(ActionRecord {
                command,
                success,
                stdout,
                stderr,
                error,
                duration_ms: started.elapsed().as_millis() as u64,
            });
            if !success {
                return (false, records);
            }
        }
        (true, records)
    }

    /// Executes the remediation for `scenario` against `raw_context`.
    pub async fn heal(&self, scenario: &str, raw_context: &Context) -> HealResult {
        let started = Instant::now();

        if let Err(reason) = validation::validate_scenario(scenario) {
            return failure(scenario, reason, started);
        }

        let context = match validation::validate_context(raw_context) {
            Ok(c) => c,
            Err(reason) => return failure(scenario, reason, started),
        };

        let Some(playbook) = self.select_playbook(scenario, &context) else {
            return failure(scenario, "No applicable playbook found", started);
        };
        let playbook_name = playbook.name.clone();

        let (success, actions) = self.run_actions(playbook, &context).await;
        let incident_id = self.next_incident_id();

        let incident = Incident {
            id: incident_id.clone(),
            scenario: scenario.to_string(),
            playbook: Some(playbook_name.clone()),
            context,
            actions: actions.clone(),
            success,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
            report_path: None,
        };
        let report_path = format!("/tmp/incident-{incident_id}.md");
        let rendered = report::render_incident_report(&incident);
        if let Err(e) = tokio::fs::write(&report_path, rendered).await {
            warn!(error = %e, path = %report_path, "failed to write incident report");
        }
        crate::core::metrics::HEALS_TOTAL
            .with_label_values(&[scenario, if success { "success" } else { "failure" }])
            .inc();
        info!(incident_id = %incident_id, success, "autoheal incident completed");

        HealResult {
            success,
            scenario: scenario.to_string(),
            playbook: Some(playbook_name),
            actions,
            incident_id: Some(incident_id),
            timestamp: incident.timestamp,
            duration_ms: incident.duration_ms,
            reason: None,
            report_path: Some(report_path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ContextValue;

    struct ScriptedRunner {
        outcomes: std::sync::Mutex<Vec<(bool, &'static str)>>,
    }

    #[async_trait::async_trait]
    impl ActionRunner for ScriptedRunner {
        async fn run(&self, _command: &str) -> (bool, String, String, Option<String>) {
            let (success, stdout) = self.outcomes.lock().unwrap().remove(0);
            (success, stdout.to_string(), String::new(), None)
        }
    }

    fn playbook(name: &str, condition: Option<&str>, actions: &[&str]) -> (String, Playbook) {
        (
            name.to_string(),
            Playbook {
                name: name.to_string(),
                condition: condition.map(str::to_string),
                actions: actions.iter().map(|s| s.to_string()).collect(),
            },
        )
    }

    fn ctx(key: &str, value: f64) -> Context {
        let mut c = Context::new();
        c.insert(key.to_string(), ContextValue::Number(value));
        c
    }

    // S3
    #[tokio::test]
    async fn happy_path_runs_all_actions_in_order() {
        let mut playbooks = IndexMap::new();
        let (name, pb) = playbook(
            "disk_space_low",
            None,
            &["find /tmp -type f -mtime +7 -delete", "docker system prune -f"],
        );
        playbooks.insert(name, pb);
        let runner = ScriptedRunner {
            outcomes: std::sync::Mutex::new(vec![(true, "ok"), (true, "ok")]),
        };
        let exec = AutoHealExecutor::with_runner(playbooks, runner);

        let result = exec.heal("disk_space_low", &ctx("disk_usage", 95.0)).await;

        assert!(result.success);
        assert_eq!(result.actions.len(), 2);
        assert!(result.actions.iter().all(|a| a.success));
        assert_eq!(result.playbook.as_deref(), Some("disk_space_low"));
        assert!(result.report_path.is_some());
    }

    // S4
    #[tokio::test]
    async fn stops_after_first_failing_action() {
        let mut playbooks = IndexMap::new();
        let (name, pb) = playbook("disk_space_low", None, &["step-one", "step-two", "step-three"]);
        playbooks.insert(name, pb);
        let runner = ScriptedRunner {
            outcomes: std::sync::Mutex::new(vec![(true, "ok"), (false, "")]),
        };
        let exec = AutoHealExecutor::with_runner(playbooks, runner);

        let result = exec.heal("disk_space_low", &ctx("disk_usage", 95.0)).await;

        assert!(!result.success);
        assert_eq!(result.actions.len(), 2);
    }

    // S5
    #[tokio::test]
    async fn sanitizer_rejection_halts_before_running() {
        let mut playbooks = IndexMap::new();
        let (name, pb) = playbook("process_down", None, &["echo test; rm -rf /"]);
        playbooks.insert(name, pb);
        let runner = ScriptedRunner {
            outcomes: std::sync::Mutex::new(vec![]),
        };
        let exec = AutoHealExecutor::with_runner(playbooks, runner);

        let result = exec.heal("process_down", &Context::new()).await;

        assert!(!result.success);
        assert_eq!(result.actions.len(), 1);
        assert!(result.actions[0].error.as_deref().unwrap().contains("dangerous pattern"));
    }

    // S6
    #[tokio::test]
    async fn condition_match_selects_fallback_playbook() {
        let mut playbooks = IndexMap::new();
        let (n1, p1) = playbook("other_scenario", Some("disk_usage > 90"), &["true"]);
        playbooks.insert(n1, p1);
        let runner = ScriptedRunner {
            outcomes: std::sync::Mutex::new(vec![(true, "")]),
        };
        let exec = AutoHealExecutor::with_runner(playbooks, runner);

        let result = exec.heal("disk_space_low", &ctx("disk_usage", 95.0)).await;

        assert!(result.success);
        assert_eq!(result.playbook.as_deref(), Some("other_scenario"));
    }

    // invariant: condition-match fallback picks the first-declared
    // candidate, not an alphabetically- or hash-ordered one.
    #[tokio::test]
    async fn condition_match_prefers_first_declared_playbook_when_several_match() {
        let mut playbooks = IndexMap::new();
        let (n1, p1) = playbook("zzz_later", Some("disk_usage > 90"), &["true"]);
        playbooks.insert(n1, p1);
        let (n2, p2) = playbook("aaa_earlier", Some("disk_usage > 90"), &["true"]);
        playbooks.insert(n2, p2);
        let runner = ScriptedRunner {
            outcomes: std::sync::Mutex::new(vec![(true, "")]),
        };
        let exec = AutoHealExecutor::with_runner(playbooks, runner);

        let result = exec.heal("disk_space_low", &ctx("disk_usage", 95.0)).await;

        assert!(result.success);
        assert_eq!(result.playbook.as_deref(), Some("zzz_later"));
    }

    #[tokio::test]
    async fn unknown_scenario_fails_without_running_anything() {
        let exec: AutoHealExecutor<ScriptedRunner> = AutoHealExecutor::with_runner(
            IndexMap::new(),
            ScriptedRunner {
                outcomes: std::sync::Mutex::new(vec![]),
            },
        );
        let result = exec.heal("not_a_scenario", &Context::new()).await;
        assert!(!result.success);
        assert!(result.incident_id.is_none());
    }

    #[tokio::test]
    async fn no_applicable_playbook_is_reported() {
        let exec: AutoHealExecutor<ScriptedRunner> = AutoHealExecutor::with_runner(
            IndexMap::new(),
            ScriptedRunner {
                outcomes: std::sync::Mutex::new(vec![]),
            },
        );
        let result = exec.heal("disk_space_low", &Context::new()).await;
        assert!(!result.success);
        assert_eq!(result.reason.as_deref(), Some("No applicable playbook found"));
    }

    // invariant 5
    #[tokio::test]
    async fn successive_heals_yield_distinct_incident_ids() {
        let mut playbooks = IndexMap::new();
        let (name, pb) = playbook("disk_space_low", None, &["true"]);
        playbooks.insert(name, pb);
        let runner = ScriptedRunner {
            outcomes: std::sync::Mutex::new(vec![(true, ""), (true, "")]),
        };
        let exec = AutoHealExecutor::with_runner(playbooks, runner);

        let first = exec.heal("disk_space_low", &Context::new()).await;
        let second = exec.heal("disk_space_low", &Context::new()).await;

        assert_ne!(first.incident_id, second.incident_id);
    }
}
