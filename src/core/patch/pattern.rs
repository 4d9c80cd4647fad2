// src/core/patch/pattern.rs

//! Built-in fix patterns: classification, keyword matching,
//! and the regex detector each pattern scans source lines with.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixKind {
    WrapTryFinally,
    AddErrorHandling,
    AddTimeout { default_ms: u64 },
    CacheReplacement,
}

pub struct Pattern {
    pub key: &'static str,
    pub types: &'static [&'static str],
    pub keywords: &'static [&'static str],
    pub detector: Lazy<Regex>,
    pub required_context: &'static [&'static str],
    pub fix: FixKind,
}

pub static CONNECTION_LEAK: Pattern = Pattern {
    key: "connection_leak",
    types: &["connection_leak", "resource_leak"],
    keywords: &["connection", "leak", "socket", "handle"],
    detector: Lazy::new(|| Regex::new(r"\b(getConnection|openConnection|connect)\s*\(").unwrap()),
    required_context: &[],
    fix: FixKind::WrapTryFinally,
};

pub static MISSING_ERROR_HANDLING: Pattern = Pattern {
    key: "missing_error_handling",
    types: &["missing_error_handling", "unhandled_exception"],
    keywords: &["error", "exception", "unhandled", "catch"],
    detector: Lazy::new(|| Regex::new(r"\bawait\s+\w+\(").unwrap()),
    required_context: &[],
    fix: FixKind::AddErrorHandling,
};

pub static MISSING_TIMEOUT: Pattern = Pattern {
    key: "missing_timeout",
    types: &["missing_timeout", "hang_risk"],
    keywords: &["timeout", "hang", "stuck", "blocking"],
    detector: Lazy::new(|| Regex::new(r"\b(fetch|request|axios\.\w+)\s*\(").unwrap()),
    required_context: &["url"],
    fix: FixKind::AddTimeout { default_ms: 30_000 },
};

pub static CACHE_REPLACEMENT: Pattern = Pattern {
    key: "cache_replacement",
    types: &["stale_cache", "cache_invalidation"],
    keywords: &["cache", "stale", "ttl", "invalidate"],
    detector: Lazy::new(|| Regex::new(r"\bcache\.(get|set)\s*\(").unwrap()),
    required_context: &[],
    fix: FixKind::CacheReplacement,
};

pub fn builtin_patterns() -> [&'static Pattern; 4] {
    [&CONNECTION_LEAK, &MISSING_ERROR_HANDLING, &MISSING_TIMEOUT, &CACHE_REPLACEMENT]
}

/// Counts how many of `pattern`'s keywords appear (case-insensitive
/// substring) across `evidence`, and whether at least one did.
pub fn keyword_hits(pattern: &Pattern, evidence: &[String]) -> usize {
    let haystacks: Vec<String> = evidence.iter().map(|e| e.to_lowercase()).collect();
    pattern
        .keywords
        .iter()
        .filter(|kw| haystacks.iter().any(|h| h.contains(&kw.to_lowercase())))
        .count()
}

/// Finds the first built-in pattern whose `types` contains `issue_type` and
/// which has at least one keyword hit in `evidence`.
pub fn match_pattern(issue_type: &str, evidence: &[String]) -> Option<(&'static Pattern, usize)> {
    builtin_patterns().into_iter().find_map(|pattern| {
        if !pattern.types.contains(&issue_type) {
            return None;
        }
        let hits = keyword_hits(pattern, evidence);
        if hits > 0 { Some((pattern, hits)) } else { None }
    })
}

/// `clamp(0.5 + 0.15 * hits, 0.5, 0.95)`.
pub fn confidence(hits: usize) -> f64 {
    (0.5 + 0.15 * hits as f64).clamp(0.5, 0.95)
}
