// src/core/autoheal/validation.rs

//! Input validation for `heal()`: scenario name and context schema, per
//! a typed schema (tagged union) rather than ad-hoc
//! checks" guidance.

use crate::core::types::{Context, ContextValue};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

pub const SCENARIOS: [&str; 5] = [
    "disk_space_low",
    "process_down",
    "memory_leak",
    "api_slow",
    "ssl_expiring",
];

const MAX_SCENARIO_LEN: usize = 50;
const MAX_STRING_FIELD_LEN: usize = 100;
const NUMERIC_RANGE: (f64, f64) = (0.0, 1_000_000.0);

static PROCESS_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("process name pattern compiles"));

const NUMERIC_FIELDS: [&str; 4] = [
    "disk_usage",
    "memory_usage",
    "api_latency_ms",
    "ssl_expires_in_days",
];
const STRING_FIELDS: [&str; 1] = ["process_name"];
const ENUM_FIELDS: [&str; 1] = ["process_status"];
const PROCESS_STATUS_VALUES: [&str; 4] = ["running", "crashed", "stopped", "unknown"];

pub fn validate_scenario(scenario: &str) -> Result<(), String> {
    if scenario.is_empty() || scenario.len() > MAX_SCENARIO_LEN {
        return Err(format!(
            "scenario must be 1-{MAX_SCENARIO_LEN} characters, got {}",
            scenario.len()
        ));
    }
    if !SCENARIOS.contains(&scenario) {
        return Err(format!("unknown scenario '{scenario}'"));
    }
    Ok(())
}

/// Validates and filters a raw context map against the declared schema.
/// Unknown keys are dropped with a warning rather than rejected.
pub fn validate_context(raw: &Context) -> Result<Context, String> {
    let mut validated = Context::new();

    for (key, value) in raw {
        if NUMERIC_FIELDS.contains(&key.as_str()) {
            let n = match value {
                ContextValue::Number(n) => *n,
                ContextValue::Text(_) => {
                    return Err(format!("field '{key}' must be numeric"));
                }
            };
            if !n.is_finite() || n < NUMERIC_RANGE.0 || n > NUMERIC_RANGE.1 {
                return Err(format!(
                    "field '{key}' value {n} is out of range [{}, {}]",
                    NUMERIC_RANGE.0, NUMERIC_RANGE.1
                ));
            }
            validated.insert(key.clone(), ContextValue::Number(n));
        } else if STRING_FIELDS.contains(&key.as_str()) {
            let s = match value {
                ContextValue::Text(s) => s,
                ContextValue::Number(_) => {
                    return Err(format!("field '{key}' must be a string"));
                }
            };
            if s.len() > MAX_STRING_FIELD_LEN || !PROCESS_NAME_RE.is_match(s) {
                return Err(format!("field '{key}' has an invalid value"));
            }
            validated.insert(key.clone(), ContextValue::Text(s.clone()));
        } else if ENUM_FIELDS.contains(&key.as_str()) {
            let s = match value {
                ContextValue::Text(s) => s,
                ContextValue::Number(_) => {
                    return Err(format!("field '{key}' must be a string"));
                }
            };
            if !PROCESS_STATUS_VALUES.contains(&s.as_str()) {
                return Err(format!("field '{key}' has an invalid enum value '{s}'"));
            }
            validated.insert(key.clone(), ContextValue::Text(s.clone()));
        } else {
            warn!(field = %key, "dropping unknown autoheal context field");
        }
    }

    Ok(validated)
}
