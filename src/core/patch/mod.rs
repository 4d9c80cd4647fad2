// src/core/patch/mod.rs

//! The Patch Generator (C6): classify an issue against the built-in
//! pattern set, locate fix sites in the supplied source files, and emit an
//! ordered, idempotently-applicable set of Changes.

mod apply;
mod location;
mod pattern;

pub use apply::apply_changes;
pub use pattern::FixKind;

use crate::core::errors::{OpsError, OpsResult};
use crate::core::types::{Change, ChangeKind, Issue, Patch};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

fn changes_for_match(fix: FixKind, lines: &[&str], matched_line: usize) -> Change {
    match fix {
        FixKind::WrapTryFinally => wrap_change(lines, matched_line, "finally", "cleanup();"),
        FixKind::AddErrorHandling => wrap_change(lines, matched_line, "catch", "handleError(err);"),
        FixKind::AddTimeout { default_ms } => {
            let original = lines[matched_line - 1];
            let patched = if let Some(paren) = original.rfind(')') {
                format!("{}, {{ timeout: {default_ms} }}{}", &original[..paren], &original[paren..])
            } else {
                format!("{original} /* timeout: {default_ms}ms */")
            };
            Change {
                kind: ChangeKind::Replace,
                line: matched_line,
                before: original.to_string(),
                after: patched,
            }
        }
        FixKind::CacheReplacement => {
            let original = lines[matched_line - 1];
            Change {
                kind: ChangeKind::Insert,
                line: matched_line,
                before: String::new(),
                after: format!("{}if (cache.isStale(key)) cache.invalidate(key);", leading_whitespace(original)),
            }
        }
    }
}

fn leading_whitespace(line: &str) -> String {
    line.chars().take_while(|c| c.is_whitespace()).collect()
}

fn wrap_change(lines: &[&str], matched_line: usize, keyword: &str, cleanup_call: &str) -> Change {
    let start = location::find_block_start(lines, matched_line - 1);
    let end = location::find_block_end(lines, matched_line - 1);
    let body: Vec<&str> = lines[start.saturating_sub(1)..end.min(lines.len())].to_vec();
    let indent = leading_whitespace(body.first().copied().unwrap_or(""));
    let before = body.join("\n");
    let wrapped_body: String = body
        .iter()
        .skip(1)
        .map(|l| format!("  {l}"))
        .collect::<Vec<_>>()
        .join("\n");
    let after = format!(
        "{indent}try {{\n{wrapped_body}\n{indent}}} {keyword} {{\n{indent}  {cleanup_call}\n{indent}}}"
    );
    Change {
        kind: ChangeKind::Wrap,
        line: start,
        before,
        after,
    }
}

/// Generates a `Patch` for `issue`. Fails when no built-in pattern matches
/// the issue's type and evidence, or when no file contains a fix site.
pub fn generate(issue: &Issue) -> OpsResult<Patch> {
    let (matched_pattern, hits) = pattern::match_pattern(&issue.issue_type, &issue.evidence)
        .ok_or_else(|| OpsError::InputInvalid(format!("no pattern matches issue type '{}'", issue.issue_type)))?;

    let mut files: HashMap<String, Vec<Change>> = HashMap::new();

    for (path, source) in &issue.files {
        let lines: Vec<&str> = source.lines().collect();
        let matches = location::find_matches(source, matched_pattern);
        if matches.is_empty() {
            continue;
        }
        let changes: Vec<Change> = matches
            .iter()
            .map(|m| changes_for_match(matched_pattern.fix, &lines, m.line))
            .collect();
        files.insert(path.clone(), changes);
    }

    if files.is_empty() {
        return Err(OpsError::InputInvalid(format!(
            "pattern '{}' matched but no fix site was found in the supplied files",
            matched_pattern.key
        )));
    }

    Ok(Patch {
        id: Uuid::new_v4().to_string(),
        issue_type: issue.issue_type.clone(),
        pattern: matched_pattern.key.to_string(),
        files,
        confidence: pattern::confidence(hits),
        timestamp: Utc::now(),
    })
}
