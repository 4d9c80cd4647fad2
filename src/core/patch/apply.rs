// src/core/patch/apply.rs

//! Applies an ordered list of `Change`s to source text. Changes are
//! applied in descending line order so each edit's line offsets are
//! unaffected by edits already made.

use crate::core::types::{Change, ChangeKind};

pub fn apply_changes(source: &str, changes: &[Change]) -> String {
    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    let mut ordered: Vec<&Change> = changes.iter().collect();
    ordered.sort_by(|a, b| b.line.cmp(&a.line));

    for change in ordered {
        let idx = change.line.saturating_sub(1);
        match change.kind {
            ChangeKind::Replace => {
                if idx < lines.len() {
                    lines[idx] = change.after.clone();
                }
            }
            ChangeKind::Insert => {
                let at = (idx + 1).min(lines.len());
                lines.insert(at, change.after.clone());
            }
            ChangeKind::Wrap => {
                apply_wrap(&mut lines, change);
            }
        }
    }

    lines.join("\n")
}

fn apply_wrap(lines: &mut Vec<String>, change: &Change) {
    let start = change.line.saturating_sub(1);
    let end = change
        .before
        .lines()
        .count()
        .checked_add(start)
        .unwrap_or(start)
        .min(lines.len());
    if start >= lines.len() || start >= end {
        return;
    }
    let replacement: Vec<String> = change.after.lines().map(str::to_string).collect();
    lines.splice(start..end, replacement);
}
