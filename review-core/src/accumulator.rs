//! Stream-delta accumulator and response parser (spec §4.7).
//!
//! Concatenates streamed content deltas in arrival order, then extracts,
//! validates, and filters the candidate JSON response.

use review_types::review::{filter_issues, Issue, Note, ReviewResult};
use thiserror::Error;

use crate::schema::review_result_schema;

#[derive(Debug, Error)]
pub enum AccumulatorError {
    #[error("LLM_SCHEMA_VIOLATION: no JSON object found in response")]
    NoJsonObject,
    #[error("LLM_SCHEMA_VIOLATION: top-level value is an array, not an object")]
    ArrayAtTopLevel,
    #[error("LLM_SCHEMA_VIOLATION: {0}")]
    SchemaViolation(String),
    #[error("LLM_SCHEMA_VIOLATION: malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Accumulates content deltas, in arrival order, into a single buffer.
#[derive(Default)]
pub struct DeltaAccumulator {
    buffer: String,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, delta: &str) {
        self.buffer.push_str(delta);
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Extracts the first `{...}` substring, accepting fenced ```json blocks.
fn extract_json_object(buffer: &str) -> Result<&str, AccumulatorError> {
    let search_space = buffer
        .find("```json")
        .map(|start| &buffer[start + "```json".len()..])
        .unwrap_or(buffer);

    let start = search_space.find('{').ok_or(AccumulatorError::NoJsonObject)?;
    let candidate = &search_space[start..];

    if let Some(array_start) = candidate.find('[') {
        if candidate[..array_start].trim().is_empty() {
            return Err(AccumulatorError::ArrayAtTopLevel);
        }
    }

    let mut depth = 0i32;
    for (idx, ch) in candidate.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&candidate[..=idx]);
                }
            }
            _ => {}
        }
    }
    Err(AccumulatorError::NoJsonObject)
}

/// Rejects a bare array at the document top level even when no `{` precedes
/// it (spec §4.7 "reject arrays at top level").
fn reject_bare_array(buffer: &str) -> Result<(), AccumulatorError> {
    let trimmed = buffer.trim_start();
    if trimmed.starts_with('[') {
        return Err(AccumulatorError::ArrayAtTopLevel);
    }
    Ok(())
}

/// Parses the accumulated buffer into a schema-conformant `ReviewResult`,
/// then applies the confidence filter (spec §4.7).
pub fn parse_and_filter(buffer: &str, llm_provider: &str, llm_model: &str, confidence_threshold: f32) -> Result<ReviewResult, AccumulatorError> {
    reject_bare_array(buffer)?;
    let json_text = extract_json_object(buffer)?;
    let value: serde_json::Value = serde_json::from_str(json_text)?;

    let schema = review_result_schema();
    let validator = jsonschema::validator_for(&schema).expect("schema must compile");
    if let Some(error) = validator.iter_errors(&value).next() {
        return Err(AccumulatorError::SchemaViolation(error.to_string()));
    }

    let summary = value["summary"].as_str().unwrap_or_default().to_string();
    let issues: Vec<Issue> = serde_json::from_value(value["issues"].clone())?;
    let non_blocking_notes: Vec<Note> = serde_json::from_value(value["non_blocking_notes"].clone())?;

    let filtered_issues = filter_issues(issues, confidence_threshold);

    Ok(ReviewResult {
        summary,
        issues: filtered_issues,
        non_blocking_notes,
        llm_provider: llm_provider.to_string(),
        llm_model: llm_model.to_string(),
        raw_llm_response: Some(buffer.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_body() -> String {
        r#"{"summary":"ok","issues":[{"file":"a.rs","start_line":1,"severity":"major","title":"t","suggestion":"s"}],"non_blocking_notes":[]}"#.to_string()
    }

    #[test]
    fn accumulator_joins_deltas_in_order() {
        let mut acc = DeltaAccumulator::new();
        acc.push("{\"a\"");
        acc.push(":1}");
        assert_eq!(acc.finish(), "{\"a\":1}");
    }

    #[test]
    fn extracts_fenced_json_block() {
        let fenced = format!("Here is the result:\n```json\n{}\n```\n", valid_body());
        let result = parse_and_filter(&fenced, "ollama", "qwen3", 0.5).unwrap();
        assert_eq!(result.summary, "ok");
        assert_eq!(result.issues.len(), 1);
    }

    #[test]
    fn rejects_array_at_top_level() {
        let err = parse_and_filter("[1,2,3]", "ollama", "qwen3", 0.5).unwrap_err();
        assert!(matches!(err, AccumulatorError::ArrayAtTopLevel));
    }

    #[test]
    fn rejects_non_json_buffer() {
        let err = parse_and_filter("definitely not JSON", "ollama", "qwen3", 0.5).unwrap_err();
        assert!(matches!(err, AccumulatorError::NoJsonObject));
    }

    #[test]
    fn rejects_additional_properties() {
        let body = r#"{"summary":"ok","issues":[],"non_blocking_notes":[],"extra":true}"#;
        let err = parse_and_filter(body, "ollama", "qwen3", 0.5).unwrap_err();
        assert!(matches!(err, AccumulatorError::SchemaViolation(_)));
    }

    #[test]
    fn confidence_filter_applies_after_parsing() {
        let body = r#"{"summary":"ok","issues":[{"file":"a.rs","start_line":1,"severity":"minor","title":"t","suggestion":"s","confidenceScore":0.1}],"non_blocking_notes":[]}"#;
        let result = parse_and_filter(body, "ollama", "qwen3", 0.5).unwrap();
        assert!(result.issues.is_empty());
    }
}
