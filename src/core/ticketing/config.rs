// src/core/ticketing/config.rs

//! Ticketing configuration shapes. Secrets are
//! referenced by `${VAR}` environment-variable syntax and resolved lazily,
//! never stored resolved in the struct.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    Basic { username: String, password: String },
    Bearer { token: String },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimiting {
    pub max_requests_per_minute: u32,
}

impl Default for RateLimiting {
    fn default() -> Self {
        Self {
            max_requests_per_minute: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deduplication {
    pub enabled: bool,
    pub window_minutes: u64,
}

impl Default for Deduplication {
    fn default() -> Self {
        Self {
            enabled: true,
            window_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketingConfig {
    pub enabled: bool,
    pub base_url: String,
    pub service_desk_id: String,
    pub request_type_id: String,
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limiting: RateLimiting,
    #[serde(default)]
    pub deduplication: Deduplication,
    #[serde(default)]
    pub priority_mapping: HashMap<String, String>,
    #[serde(default)]
    pub issue_type_mapping: HashMap<String, String>,
    #[serde(default)]
    pub transition_mapping: HashMap<String, String>,
    #[serde(default)]
    pub custom_fields: HashMap<String, String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Expands `${VAR}` references against the process environment. Unresolved
/// variables are left as-is rather than failing — the ticketing adapter
/// treats a missing secret as a remote-call failure, not a config error.
pub fn resolve_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = value[i + 2..].find('}') {
                let var = &value[i + 2..i + 2 + end];
                match std::env::var(var) {
                    Ok(resolved) => out.push_str(&resolved),
                    Err(_) => out.push_str(&value[i..i + 2 + end + 1]),
                }
                i = i + 2 + end + 1;
                continue;
            }
        }
        let ch = value[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_env_var() {
        unsafe {
            std::env::set_var("OPSD_TEST_TOKEN", "secret123");
        }
        assert_eq!(resolve_env("Bearer ${OPSD_TEST_TOKEN}"), "Bearer secret123");
    }

    #[test]
    fn leaves_unknown_var_untouched() {
        assert_eq!(resolve_env("Bearer ${OPSD_DOES_NOT_EXIST}"), "Bearer ${OPSD_DOES_NOT_EXIST}");
    }
}
