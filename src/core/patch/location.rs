// src/core/patch/location.rs

//! Location discovery: scans source lines for a pattern's detector regex,
//! gated by required-context tokens in a small surrounding window, and the
//! simple block-boundary heuristics `wrap` fixes need.

use super::pattern::Pattern;

const CONTEXT_WINDOW: usize = 3;

/// A line (1-indexed) where `pattern`'s detector matched and all required
/// context tokens were present nearby.
#[derive(Debug, Clone, Copy)]
pub struct MatchedLine {
    pub line: usize,
}

pub fn find_matches(source: &str, pattern: &Pattern) -> Vec<MatchedLine> {
    let lines: Vec<&str> = source.lines().collect();
    let mut matches = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        if !pattern.detector.is_match(line) {
            continue;
        }
        if !has_required_context(&lines, idx, pattern.required_context) {
            continue;
        }
        matches.push(MatchedLine { line: idx + 1 });
    }

    matches
}

fn has_required_context(lines: &[&str], idx: usize, required: &[&str]) -> bool {
    if required.is_empty() {
        return true;
    }
    let start = idx.saturating_sub(CONTEXT_WINDOW);
    let end = (idx + CONTEXT_WINDOW + 1).min(lines.len());
    let window: String = lines[start..end].join("\n").to_lowercase();
    required.iter().all(|token| window.contains(&token.to_lowercase()))
}

/// The nearest preceding `function`/`async function` line, used as a
/// wrap-fix block start.
pub fn find_block_start(lines: &[&str], from_line: usize) -> usize {
    for idx in (0..from_line).rev() {
        let trimmed = lines[idx].trim_start();
        if trimmed.starts_with("function ") || trimmed.starts_with("async function ") {
            return idx + 1;
        }
    }
    1
}

/// The nearest following `return` statement or closing brace at the same
/// indentation as the block start, used as a wrap-fix block end.
pub fn find_block_end(lines: &[&str], from_line: usize) -> usize {
    for (idx, line) in lines.iter().enumerate().skip(from_line) {
        let trimmed = line.trim();
        if trimmed.starts_with("return") || trimmed == "}" {
            return idx + 1;
        }
    }
    lines.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::patch::pattern::CONNECTION_LEAK;

    #[test]
    fn finds_detector_match_without_required_context() {
        let src = "function handle() {\n  const conn = getConnection();\n  return conn;\n}";
        let matches = find_matches(src, &CONNECTION_LEAK);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].line, 2);
    }

    #[test]
    fn block_boundaries_bracket_the_matched_line() {
        let src = "function handle() {\n  const conn = getConnection();\n  return conn;\n}";
        let lines: Vec<&str> = src.lines().collect();
        let start = find_block_start(&lines, 1);
        let end = find_block_end(&lines, 1);
        assert_eq!(start, 1);
        assert_eq!(end, 3);
    }
}
