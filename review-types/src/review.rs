//! LLM review output shape (spec §3, §6 JSON schema).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Major,
    Minor,
    Info,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Some(Self::Critical),
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub file: String,
    pub start_line: u32,
    pub severity: Severity,
    pub title: String,
    pub suggestion: String,
    #[serde(rename = "confidenceScore", skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f32>,
    #[serde(rename = "confidenceExplanation", skip_serializing_if = "Option::is_none")]
    pub confidence_explanation: Option<String>,
    /// base64-encoded markdown diff, per §6.
    #[serde(rename = "suggestedFix", skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<String>,
}

impl Issue {
    /// §8 invariant 3: `start_line >= 1` and severity must be one of the
    /// taxonomy values (already enforced by the enum) for the issue to be
    /// emitted at all.
    pub fn is_emittable(&self) -> bool {
        self.start_line >= 1
    }

    /// Default-confidence lookup used by the confidence filter in §4.7.
    pub fn effective_confidence(&self) -> f32 {
        self.confidence_score.unwrap_or(0.5)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub file: String,
    pub line: u32,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResult {
    pub summary: String,
    pub issues: Vec<Issue>,
    pub non_blocking_notes: Vec<Note>,
    pub llm_provider: String,
    pub llm_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_llm_response: Option<String>,
}

/// Drops issues failing §8 invariant 3 and applies the confidence filter
/// from §4.7 (threshold clamped into `[0,1]`, default 0.5).
pub fn filter_issues(issues: Vec<Issue>, threshold: f32) -> Vec<Issue> {
    let threshold = if (0.0..=1.0).contains(&threshold) {
        threshold
    } else {
        0.5
    };
    issues
        .into_iter()
        .filter(Issue::is_emittable)
        .filter(|i| i.effective_confidence() >= threshold)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(start_line: u32, confidence: Option<f32>) -> Issue {
        Issue {
            file: "a.rs".into(),
            start_line,
            severity: Severity::Minor,
            title: "t".into(),
            suggestion: "s".into(),
            confidence_score: confidence,
            confidence_explanation: None,
            suggested_fix: None,
        }
    }

    #[test]
    fn zero_start_line_is_not_emittable() {
        assert!(!issue(0, Some(0.9)).is_emittable());
        assert!(issue(1, Some(0.9)).is_emittable());
    }

    #[test]
    fn confidence_filter_drops_below_threshold_and_defaults_missing_to_half() {
        let issues = vec![issue(1, Some(0.9)), issue(2, Some(0.3)), issue(3, None)];
        let out = filter_issues(issues, 0.5);
        let lines: Vec<u32> = out.iter().map(|i| i.start_line).collect();
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn out_of_range_threshold_falls_back_to_half() {
        let issues = vec![issue(1, Some(0.5)), issue(2, Some(0.4))];
        let out = filter_issues(issues, 5.0);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn review_result_round_trips() {
        let result = ReviewResult {
            summary: "ok".into(),
            issues: vec![issue(1, Some(0.8))],
            non_blocking_notes: vec![Note { file: "b.rs".into(), line: 2, note: "n".into() }],
            llm_provider: "ollama".into(),
            llm_model: "qwen3".into(),
            raw_llm_response: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        let back: ReviewResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, result.summary);
        assert_eq!(back.issues.len(), 1);
    }
}
