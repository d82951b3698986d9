//! Prompt assembly for C7 (spec §4.7).
//!
//! The system prompt describes the reviewer role, severity taxonomy, and
//! required JSON output shape. The user prompt concatenates, in order:
//! ticket context, repository policy blocks, PR metadata, the raw unified
//! diff, and the structured context-match list.

use review_types::diff::EnrichedDiff;

/// Builds the system prompt: reviewer role, severity taxonomy, output shape.
pub fn build_system_prompt() -> String {
    r#"You are an automated code reviewer. Review the supplied diff and any
attached context, then respond with a single JSON object and nothing else.

Severity taxonomy (use exactly one per issue): critical, major, minor, info.

Required JSON shape:
{
  "summary": "string",
  "issues": [
    {
      "file": "string",
      "start_line": 1,
      "severity": "critical|major|minor|info",
      "title": "string",
      "suggestion": "string",
      "confidenceScore": 0.0,
      "confidenceExplanation": "string",
      "suggestedFix": "base64-encoded markdown diff"
    }
  ],
  "non_blocking_notes": [
    { "file": "string", "line": 1, "note": "string" }
  ]
}

Only "file", "start_line", "severity", "title", and "suggestion" are required
per issue. Do not emit any field not listed above. Do not wrap the JSON in
prose; a fenced ```json block is acceptable."#
        .to_string()
}

/// Builds the user prompt from optional ticket context and the enriched diff.
pub fn build_user_prompt(ticket_context: Option<&str>, enriched: &EnrichedDiff) -> String {
    let mut sections = Vec::new();

    if let Some(ticket) = ticket_context {
        if !ticket.trim().is_empty() {
            sections.push(format!("## Ticket / business context\n{ticket}"));
        }
    }

    if !enriched.repository_policies.is_empty() {
        let mut block = String::from("## Repository policies\n");
        for policy in &enriched.repository_policies {
            block.push_str(&format!(
                "### {} ({})\n{}\n\n",
                policy.name, policy.path, policy.content
            ));
        }
        sections.push(block);
    }

    if let Some(meta) = &enriched.pr_metadata {
        let labels = meta.labels.join(", ");
        let commits = meta
            .commit_messages
            .iter()
            .map(|m| format!("- {m}"))
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(format!(
            "## Pull request metadata\nTitle: {}\nAuthor: {}\nLabels: {}\nDescription:\n{}\nCommits:\n{}",
            meta.title, meta.author, labels, meta.description, commits
        ));
    }

    sections.push(format!("## Diff\n{}", enriched.diff.to_unified_text()));

    if !enriched.context_matches.is_empty() {
        let mut block = String::from("## Related context\n");
        for m in &enriched.context_matches {
            block.push_str(&format!(
                "- {} ({:?}, confidence={:.2}): {}\n",
                m.file_path, m.reason, m.confidence, m.evidence
            ));
        }
        sections.push(block);
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_types::diff::DiffDocument;
    use review_types::{Provider, RepositoryIdentifier};

    fn base_enriched() -> EnrichedDiff {
        EnrichedDiff {
            diff: DiffDocument::default(),
            repository_identifier: RepositoryIdentifier::new(Provider::Github, "a/b"),
            context_matches: vec![],
            strategy_metadata: vec![],
            pr_metadata: None,
            repository_policies: vec![],
            files_expanded: 0,
            files_skipped: 0,
        }
    }

    #[test]
    fn system_prompt_names_all_four_severities() {
        let prompt = build_system_prompt();
        for severity in ["critical", "major", "minor", "info"] {
            assert!(prompt.contains(severity));
        }
    }

    #[test]
    fn user_prompt_omits_empty_optional_sections() {
        let enriched = base_enriched();
        let prompt = build_user_prompt(None, &enriched);
        assert!(!prompt.contains("Ticket / business context"));
        assert!(!prompt.contains("Repository policies"));
        assert!(!prompt.contains("Pull request metadata"));
        assert!(prompt.contains("## Diff"));
    }

    #[test]
    fn user_prompt_includes_ticket_context_when_present() {
        let enriched = base_enriched();
        let prompt = build_user_prompt(Some("JIRA-123: fix race condition"), &enriched);
        assert!(prompt.contains("JIRA-123"));
    }
}
