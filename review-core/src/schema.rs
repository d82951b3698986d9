//! Draft-07 JSON schema for the Review-result shape (spec §6). No additional
//! properties permitted at any level.

use serde_json::{json, Value};

pub fn review_result_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "required": ["summary", "issues", "non_blocking_notes"],
        "properties": {
            "summary": { "type": "string" },
            "issues": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["file", "start_line", "severity", "title", "suggestion"],
                    "properties": {
                        "file": { "type": "string" },
                        "start_line": { "type": "integer", "minimum": 1 },
                        "severity": { "enum": ["critical", "major", "minor", "info"] },
                        "title": { "type": "string" },
                        "suggestion": { "type": "string" },
                        "confidenceScore": { "type": "number", "minimum": 0, "maximum": 1 },
                        "confidenceExplanation": { "type": "string" },
                        "suggestedFix": { "type": "string" }
                    }
                }
            },
            "non_blocking_notes": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["file", "line", "note"],
                    "properties": {
                        "file": { "type": "string" },
                        "line": { "type": "integer", "minimum": 1 },
                        "note": { "type": "string" }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_compiles() {
        let schema = review_result_schema();
        jsonschema::validator_for(&schema).expect("schema must compile");
    }
}
