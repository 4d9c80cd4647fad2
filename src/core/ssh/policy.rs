// src/core/ssh/policy.rs

//! Command allow/deny policy for the Remote Executor (C2). Pure and
//! side-effect free so it can be unit tested without dialing anything.

use once_cell::sync::Lazy;
use regex::Regex;
use wildmatch::WildMatch;

/// Patterns that are always denied unless the command is also present in
/// an allowlist and approval was explicitly requested.
static HARD_DENY: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"rm\s+-rf\s+/(\s|$)",
        r"\bdd\s+if=",
        r"\bmkfs(\.\w+)?\b",
        r"\bfdisk\b",
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static deny pattern compiles"))
    .collect()
});

/// An allowlist of fully instantiated commands, or a wildcard that admits
/// everything not hard-denied.
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    patterns: Vec<String>,
}

impl Allowlist {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    fn is_wildcard(&self) -> bool {
        self.patterns.iter().any(|p| p == "*")
    }

    fn matches(&self, command: &str) -> bool {
        self.is_wildcard()
            || self
                .patterns
                .iter()
                .any(|p| WildMatch::new(p).matches(command))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny,
}

/// Evaluates `command` against the hard-deny list and the configured
/// allowlist:
///
/// - A hard-deny pattern always loses unless `require_approval` is set
///   AND the command is also present in the allowlist.
/// - With no allowlist configured, or a wildcard allowlist, every
///   non-hard-deny command passes.
pub fn evaluate(command: &str, allowlist: &Allowlist, require_approval: bool) -> PolicyDecision {
    let hard_denied = HARD_DENY.iter().any(|re| re.is_match(command));

    if hard_denied {
        if require_approval && allowlist.matches(command) {
            return PolicyDecision::Allow;
        }
        return PolicyDecision::Deny;
    }

    if allowlist.patterns.is_empty() || allowlist.is_wildcard() {
        return PolicyDecision::Allow;
    }

    if allowlist.matches(command) {
        PolicyDecision::Allow
    } else {
        PolicyDecision::Deny
    }
}
