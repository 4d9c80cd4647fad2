// src/config.rs

//! Configuration shapes for the monitoring sources, alert thresholds,
//! AutoHeal playbooks, server inventory, SSH allowlist, and ticketing
//! integration. Loading these from a file is out of
//! scope here; callers construct or deserialize them and pass the result
//! in.

use crate::core::ticketing::TicketingConfig;
use crate::core::types::{AlertThresholds, Playbook};
use anyhow::{Result, anyhow};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single Prometheus query, keyed by a short name used elsewhere as the
/// metric's canonical identifier.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub queries: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckTarget {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogSources {
    #[serde(default)]
    pub paths: Vec<String>,
}

/// The monitoring-sources configuration: what to scrape, probe, and tail.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub prometheus: Option<PrometheusConfig>,
    #[serde(default)]
    pub healthchecks: Vec<HealthCheckTarget>,
    #[serde(default)]
    pub logs: LogSources,
}

/// `{ <scenario>: { condition?, actions } }` — keyed by scenario name,
/// deserialized directly into the map the AutoHeal Executor is built from.
/// Order-preserving: the condition-match fallback in the AutoHeal Executor
/// picks the first declared playbook whose condition matches, so the
/// declaration order in the config file must survive deserialization.
pub type PlaybooksConfig = IndexMap<String, Playbook>;

/// SSH parameters shared by every host in a server inventory, plus the
/// private key material (inline PEM or a path to one, never both).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshDefaults {
    pub user: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

/// `{ ssh: {...}, groups: {<name>: [host, ...]} }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServersConfig {
    pub ssh: SshDefaults,
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

/// `{ allowedCommands: [...] }`; wildcard `*` permits every command. The
/// glob matching itself lives in `core::ssh::policy::Allowlist`, which the
/// Remote Executor is built from; this type is just the config shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SshAllowlist {
    #[serde(default)]
    pub allowed_commands: Vec<String>,
}

/// The top-level configuration bundle an opsd process is assembled from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsdConfig {
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub alert_thresholds: AlertThresholds,
    #[serde(default)]
    pub playbooks: PlaybooksConfig,
    pub servers: ServersConfig,
    #[serde(default)]
    pub ssh_allowlist: SshAllowlist,
    pub ticketing: TicketingConfig,
}

impl OpsdConfig {
    /// Validates cross-field consistency the individual `Deserialize` impls
    /// can't express: every server group must resolve to at least one host,
    /// and a server entry must carry exactly one of `private_key`/`key_path`.
    pub fn validate(&self) -> Result<()> {
        if self.servers.ssh.private_key.is_some() == self.servers.ssh.key_path.is_some() {
            return Err(anyhow!(
                "servers.ssh must set exactly one of private_key or key_path"
            ));
        }
        for (name, hosts) in &self.servers.groups {
            if hosts.is_empty() {
                return Err(anyhow!("server group '{name}' has no members"));
            }
        }
        if self.ticketing.enabled && self.ticketing.base_url.trim().is_empty() {
            return Err(anyhow!("ticketing.base_url cannot be empty when ticketing is enabled"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ticketing::AuthConfig;

    fn sample_config() -> OpsdConfig {
        OpsdConfig {
            monitoring: MonitoringConfig::default(),
            alert_thresholds: AlertThresholds::default(),
            playbooks: IndexMap::new(),
            servers: ServersConfig {
                ssh: SshDefaults {
                    user: "deploy".to_string(),
                    port: 22,
                    private_key: Some("-----BEGIN KEY-----".to_string()),
                    key_path: None,
                },
                groups: HashMap::from([("web".to_string(), vec!["web-1".to_string(), "web-2".to_string()])]),
            },
            ssh_allowlist: SshAllowlist {
                allowed_commands: vec!["systemctl restart *".to_string()],
            },
            ticketing: TicketingConfig {
                enabled: false,
                base_url: String::new(),
                service_desk_id: String::new(),
                request_type_id: String::new(),
                auth: AuthConfig::Bearer {
                    token: "${TICKET_TOKEN}".to_string(),
                },
                rate_limiting: Default::default(),
                deduplication: Default::default(),
                priority_mapping: HashMap::new(),
                issue_type_mapping: HashMap::new(),
                transition_mapping: HashMap::new(),
                custom_fields: HashMap::new(),
                labels: Vec::new(),
            },
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn both_key_forms_set_is_rejected() {
        let mut cfg = sample_config();
        cfg.servers.ssh.key_path = Some("/etc/opsd/id_ed25519".to_string());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn neither_key_form_set_is_rejected() {
        let mut cfg = sample_config();
        cfg.servers.ssh.private_key = None;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn empty_group_is_rejected() {
        let mut cfg = sample_config();
        cfg.servers.groups.insert("empty".to_string(), vec![]);
        assert!(cfg.validate().is_err());
    }
}
