//! PR metadata and repository policy document retrieval (spec §4.6 step 5).

use review_providers::ScmPort;
use review_types::diff::{PrMetadata, RepositoryPolicyDocument};

const POLICY_CANDIDATES: &[(&str, &[&str])] = &[
    ("CONTRIBUTING", &["CONTRIBUTING.md", ".github/CONTRIBUTING.md"]),
    ("SECURITY", &["SECURITY.md", ".github/SECURITY.md"]),
    ("PULL_REQUEST_TEMPLATE", &[".github/PULL_REQUEST_TEMPLATE.md", "PULL_REQUEST_TEMPLATE.md"]),
    ("CODE_OF_CONDUCT", &["CODE_OF_CONDUCT.md", ".github/CODE_OF_CONDUCT.md"]),
];

/// Fetches each policy document from its canonical path, falling back to
/// alternates; truncates content beyond `max_chars` with an explicit marker.
pub async fn fetch_repository_policies(
    scm: &ScmPort,
    repository_id: &str,
    git_ref: &str,
    max_chars: usize,
) -> Vec<RepositoryPolicyDocument> {
    let mut out = Vec::new();
    for (name, paths) in POLICY_CANDIDATES {
        for path in *paths {
            match scm.fetch_file_at_ref(repository_id, path, git_ref).await {
                Ok(Some(bytes)) => {
                    let content = String::from_utf8_lossy(&bytes).into_owned();
                    let (content, truncated) = truncate(&content, max_chars);
                    out.push(RepositoryPolicyDocument {
                        name: name.to_string(),
                        path: path.to_string(),
                        content,
                        truncated,
                    });
                    break;
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(path, error = %e, "policy document fetch failed, trying next alternate");
                    continue;
                }
            }
        }
    }
    out
}

fn truncate(content: &str, max_chars: usize) -> (String, bool) {
    if content.chars().count() <= max_chars {
        return (content.to_string(), false);
    }
    let truncated: String = content.chars().take(max_chars).collect();
    (format!("{truncated}\n\n[... truncated ...]"), true)
}

/// Builds `PrMetadata`, capping the number of commit messages included.
pub fn build_pr_metadata(
    title: String,
    description: String,
    author: String,
    labels: Vec<String>,
    all_commit_messages: Vec<String>,
    max_commits: usize,
) -> PrMetadata {
    let commit_messages = all_commit_messages.into_iter().take(max_commits).collect();
    PrMetadata { title, description, author, labels, commit_messages }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_marks_content_over_the_limit() {
        let (content, truncated) = truncate(&"a".repeat(100), 10);
        assert!(truncated);
        assert!(content.starts_with(&"a".repeat(10)));
    }

    #[test]
    fn truncate_leaves_short_content_untouched() {
        let (content, truncated) = truncate("short", 100);
        assert!(!truncated);
        assert_eq!(content, "short");
    }

    #[test]
    fn pr_metadata_caps_commit_messages() {
        let meta = build_pr_metadata(
            "t".into(),
            "d".into(),
            "a".into(),
            vec![],
            vec!["one".into(), "two".into(), "three".into()],
            2,
        );
        assert_eq!(meta.commit_messages.len(), 2);
    }
}
