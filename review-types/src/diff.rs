//! Diff and context-enrichment data model (spec §3: `DiffDocument`,
//! `FileModification`, `DiffHunk`, `ContextMatch`, `EnrichedDiff`).

use serde::{Deserialize, Serialize};

use crate::RepositoryIdentifier;

/// A single line within a hunk, tagged by its diff role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiffLine {
    Context { old_line: u32, new_line: u32, content: String },
    Added { new_line: u32, content: String },
    Removed { old_line: u32, content: String },
}

/// `{oldStart, oldCount, newStart, newCount, lines}`. Invariant: the number
/// of context/removed lines equals `old_count` and the number of
/// context/added lines equals `new_count` (checked by [`DiffHunk::is_consistent`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    pub fn is_consistent(&self) -> bool {
        let mut old = 0u32;
        let mut new = 0u32;
        for line in &self.lines {
            match line {
                DiffLine::Context { .. } => {
                    old += 1;
                    new += 1;
                }
                DiffLine::Added { .. } => new += 1,
                DiffLine::Removed { .. } => old += 1,
            }
        }
        old == self.old_count && new == self.new_count
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileModification {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    pub hunks: Vec<DiffHunk>,
}

impl FileModification {
    /// The path an `Issue`/`ContextMatch` should anchor to: the new path if
    /// the file still exists post-change, else the old path (deletions).
    pub fn display_path(&self) -> &str {
        self.new_path
            .as_deref()
            .or(self.old_path.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffDocument {
    pub files: Vec<FileModification>,
}

impl DiffDocument {
    /// Renders the document back to unified-diff text with hunk headers, for
    /// embedding in the LLM prompt (spec §4.7: "raw unified text with hunk
    /// headers").
    pub fn to_unified_text(&self) -> String {
        let mut out = String::new();
        for file in &self.files {
            let old = file.old_path.as_deref().unwrap_or("/dev/null");
            let new = file.new_path.as_deref().unwrap_or("/dev/null");
            out.push_str(&format!("--- {old}\n+++ {new}\n"));
            for hunk in &file.hunks {
                out.push_str(&format!(
                    "@@ -{},{} +{},{} @@\n",
                    hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count
                ));
                for line in &hunk.lines {
                    match line {
                        DiffLine::Context { content, .. } => out.push_str(&format!(" {content}\n")),
                        DiffLine::Added { content, .. } => out.push_str(&format!("+{content}\n")),
                        DiffLine::Removed { content, .. } => out.push_str(&format!("-{content}\n")),
                    }
                }
            }
        }
        out
    }
}

/// Why a file was surfaced as related context, with a confidence in `[0,1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextReason {
    FileReference,
    SiblingFile,
    GitCochangeRecent,
    GitCochangeHistorical,
    SamePackage,
    DirectImport,
    TypeReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMatch {
    pub file_path: String,
    pub reason: ContextReason,
    pub confidence: f32,
    pub evidence: String,
}

impl ContextMatch {
    /// Clamps confidence into `[0,1]`, per the scale used for the LLM
    /// confidence filter elsewhere in the pipeline.
    pub fn clamped(mut self) -> Self {
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }
}

/// Per-strategy observability, reported alongside merged matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRetrievalResult {
    pub strategy: String,
    pub matches: Vec<ContextMatch>,
    pub execution_millis: u128,
    pub candidate_count: usize,
    pub high_confidence_count: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrMetadata {
    pub title: String,
    pub description: String,
    pub author: String,
    pub labels: Vec<String>,
    pub commit_messages: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryPolicyDocument {
    pub name: String,
    pub path: String,
    pub content: String,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedDiff {
    pub diff: DiffDocument,
    pub repository_identifier: RepositoryIdentifier,
    pub context_matches: Vec<ContextMatch>,
    pub strategy_metadata: Vec<ContextRetrievalResult>,
    pub pr_metadata: Option<PrMetadata>,
    pub repository_policies: Vec<RepositoryPolicyDocument>,
    pub files_expanded: usize,
    pub files_skipped: usize,
}

/// Deduplicates `matches` by `file_path`, keeping the highest-confidence
/// occurrence, and sorts the result by descending confidence. (spec §4.6.3,
/// invariant 4 of §8.)
pub fn merge_context_matches(matches: Vec<ContextMatch>) -> Vec<ContextMatch> {
    use std::collections::HashMap;

    let mut best: HashMap<String, ContextMatch> = HashMap::new();
    for m in matches {
        let m = m.clamped();
        match best.get(&m.file_path) {
            Some(existing) if existing.confidence >= m.confidence => {}
            _ => {
                best.insert(m.file_path.clone(), m);
            }
        }
    }
    let mut out: Vec<ContextMatch> = best.into_values().collect();
    out.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hunk_consistency_checks_line_counts() {
        let hunk = DiffHunk {
            old_start: 1,
            old_count: 2,
            new_start: 1,
            new_count: 3,
            lines: vec![
                DiffLine::Context { old_line: 1, new_line: 1, content: "a".into() },
                DiffLine::Removed { old_line: 2, content: "b".into() },
                DiffLine::Added { new_line: 2, content: "c".into() },
                DiffLine::Added { new_line: 3, content: "d".into() },
            ],
        };
        assert!(hunk.is_consistent());
    }

    #[test]
    fn merge_dedups_by_path_keeping_max_confidence_desc_sorted() {
        let matches = vec![
            ContextMatch {
                file_path: "a.rs".into(),
                reason: ContextReason::SiblingFile,
                confidence: 0.4,
                evidence: "e1".into(),
            },
            ContextMatch {
                file_path: "a.rs".into(),
                reason: ContextReason::DirectImport,
                confidence: 0.9,
                evidence: "e2".into(),
            },
            ContextMatch {
                file_path: "b.rs".into(),
                reason: ContextReason::SamePackage,
                confidence: 0.5,
                evidence: "e3".into(),
            },
        ];
        let merged = merge_context_matches(matches);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].file_path, "a.rs");
        assert_eq!(merged[0].confidence, 0.9);
        assert!(merged[0].confidence >= merged[1].confidence);
    }

    #[test]
    fn renders_unified_text_with_hunk_headers_and_prefixes() {
        let doc = DiffDocument {
            files: vec![FileModification {
                old_path: Some("a.rs".into()),
                new_path: Some("a.rs".into()),
                hunks: vec![DiffHunk {
                    old_start: 1,
                    old_count: 1,
                    new_start: 1,
                    new_count: 2,
                    lines: vec![
                        DiffLine::Context { old_line: 1, new_line: 1, content: "fn main() {}".into() },
                        DiffLine::Added { new_line: 2, content: "// note".into() },
                    ],
                }],
            }],
        };
        let text = doc.to_unified_text();
        assert!(text.contains("--- a.rs\n+++ a.rs\n"));
        assert!(text.contains("@@ -1,1 +1,2 @@\n"));
        assert!(text.contains(" fn main() {}\n"));
        assert!(text.contains("+// note\n"));
    }

    #[test]
    fn confidence_is_clamped_into_unit_interval() {
        let m = ContextMatch {
            file_path: "x.rs".into(),
            reason: ContextReason::SiblingFile,
            confidence: 1.8,
            evidence: String::new(),
        }
        .clamped();
        assert_eq!(m.confidence, 1.0);
    }
}
