//! Independent context-retrieval strategies (spec §4.6 step 2).
//!
//! Each strategy is a plain async function returning a
//! [`review_types::diff::ContextRetrievalResult`]; failures are caught by the
//! caller and turned into an error-carrying result rather than propagated,
//! since a single strategy failing must never fail the whole request.

use std::collections::HashMap;
use std::time::Instant;

use review_types::diff::{ContextMatch, ContextReason, ContextRetrievalResult, DiffDocument};

/// Same-directory / same-package heuristic: files sharing a parent directory
/// with a modified file are surfaced as likely-related siblings.
pub fn same_package_sibling_strategy(diff: &DiffDocument, repo_files: &[String]) -> ContextRetrievalResult {
    let t0 = Instant::now();
    let mut matches = Vec::new();
    let modified_dirs: Vec<&str> = diff
        .files
        .iter()
        .filter_map(|f| f.new_path.as_deref())
        .filter_map(|p| p.rsplit_once('/').map(|(dir, _)| dir))
        .collect();

    for candidate in repo_files {
        let Some((dir, _)) = candidate.rsplit_once('/') else {
            continue;
        };
        if modified_dirs.contains(&dir) && !diff.files.iter().any(|f| f.new_path.as_deref() == Some(candidate.as_str())) {
            matches.push(ContextMatch {
                file_path: candidate.clone(),
                reason: ContextReason::SiblingFile,
                confidence: 0.6,
                evidence: format!("shares directory {dir}"),
            });
        }
    }

    let high_confidence_count = matches.iter().filter(|m| m.confidence >= 0.7).count();
    ContextRetrievalResult {
        strategy: "same_package_sibling".to_string(),
        candidate_count: matches.len(),
        high_confidence_count,
        matches,
        execution_millis: t0.elapsed().as_millis(),
        error: None,
    }
}

/// Diff-embedded import/reference extraction: scans added lines for
/// import/include/use/require-like constructs and surfaces the referenced
/// module path as a context match.
pub fn import_reference_strategy(diff: &DiffDocument) -> ContextRetrievalResult {
    let t0 = Instant::now();
    let mut matches = Vec::new();

    for file in &diff.files {
        for hunk in &file.hunks {
            for line in &hunk.lines {
                let review_types::diff::DiffLine::Added { content, .. } = line else {
                    continue;
                };
                if let Some(reference) = extract_import_reference(content) {
                    matches.push(ContextMatch {
                        file_path: reference,
                        reason: ContextReason::DirectImport,
                        confidence: 0.7,
                        evidence: content.trim().to_string(),
                    });
                }
            }
        }
    }

    let high_confidence_count = matches.iter().filter(|m| m.confidence >= 0.7).count();
    ContextRetrievalResult {
        strategy: "import_reference".to_string(),
        candidate_count: matches.len(),
        high_confidence_count,
        matches,
        execution_millis: t0.elapsed().as_millis(),
        error: None,
    }
}

fn is_import_like(line: &str) -> bool {
    line.contains("import ")
        || line.contains("#include")
        || line.contains(" include ")
        || line.contains(" using ")
        || line.contains(" from ")
        || line.contains("require(")
        || line.trim_start().starts_with("use ")
}

fn extract_import_reference(line: &str) -> Option<String> {
    if !is_import_like(line) {
        return None;
    }
    let candidates = ["\"", "'"];
    for quote in candidates {
        if let Some(start) = line.find(quote) {
            let rest = &line[start + 1..];
            if let Some(end) = rest.find(quote) {
                return Some(rest[..end].to_string());
            }
        }
    }
    line.split_whitespace()
        .find(|tok| tok.contains("::") || tok.contains('.'))
        .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric() && c != '_' && c != ':' && c != '.').to_string())
        .filter(|s| !s.is_empty())
}

/// Per-file co-change counts over a sliding window, keyed by modified file
/// path, precomputed from commit history outside this crate (spec §4.6 step
/// 2's "sliding window of N days/K commits").
pub type CoChangeIndex = HashMap<String, Vec<(String, u32)>>;

/// History-based co-change: files frequently touched alongside a modified
/// file in recent commits. Confidence scales with the recency-weighted
/// co-change count, capped at 1.0.
pub fn co_change_strategy(diff: &DiffDocument, index: &CoChangeIndex) -> ContextRetrievalResult {
    let t0 = Instant::now();
    let mut matches = Vec::new();

    for file in &diff.files {
        let Some(path) = file.new_path.as_deref() else {
            continue;
        };
        let Some(co_changed) = index.get(path) else {
            continue;
        };
        for (other_path, count) in co_changed {
            if diff.files.iter().any(|f| f.new_path.as_deref() == Some(other_path.as_str())) {
                continue;
            }
            let confidence = (*count as f32 / 10.0).min(1.0).max(0.1);
            matches.push(ContextMatch {
                file_path: other_path.clone(),
                reason: ContextReason::GitCochangeRecent,
                confidence,
                evidence: format!("co-changed with {path} in {count} recent commits"),
            });
        }
    }

    let high_confidence_count = matches.iter().filter(|m| m.confidence >= 0.7).count();
    ContextRetrievalResult {
        strategy: "git_cochange".to_string(),
        candidate_count: matches.len(),
        high_confidence_count,
        matches,
        execution_millis: t0.elapsed().as_millis(),
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_types::diff::{DiffHunk, DiffLine, FileModification};

    fn sample_diff() -> DiffDocument {
        DiffDocument {
            files: vec![FileModification {
                old_path: Some("src/handler.rs".into()),
                new_path: Some("src/handler.rs".into()),
                hunks: vec![DiffHunk {
                    old_start: 1,
                    old_count: 1,
                    new_start: 1,
                    new_count: 2,
                    lines: vec![
                        DiffLine::Context { old_line: 1, new_line: 1, content: "fn x() {}".into() },
                        DiffLine::Added { new_line: 2, content: "use crate::util::helper;".into() },
                    ],
                }],
            }],
        }
    }

    #[test]
    fn sibling_strategy_finds_same_directory_files() {
        let diff = sample_diff();
        let repo_files = vec!["src/util.rs".to_string(), "src/handler.rs".to_string(), "docs/readme.md".to_string()];
        let result = same_package_sibling_strategy(&diff, &repo_files);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].file_path, "src/util.rs");
    }

    #[test]
    fn import_strategy_extracts_referenced_module() {
        let diff = sample_diff();
        let result = import_reference_strategy(&diff);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].file_path, "crate::util::helper");
    }

    #[test]
    fn cochange_strategy_skips_files_already_in_the_diff() {
        let diff = sample_diff();
        let mut index = CoChangeIndex::new();
        index.insert(
            "src/handler.rs".to_string(),
            vec![("src/handler.rs".to_string(), 5), ("src/router.rs".to_string(), 8)],
        );
        let result = co_change_strategy(&diff, &index);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].file_path, "src/router.rs");
    }
}
