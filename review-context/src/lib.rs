//! C6: Diff/Context Pipeline.
//!
//! Fetches the diff through the SCM port, runs the configured context
//! strategies in parallel (each non-fatal on its own failure), merges and
//! deduplicates matches, expands small modified files, and attaches PR
//! metadata and repository policy documents.

pub mod expansion;
pub mod policies;
pub mod strategies;

use std::time::Instant;

use review_providers::{ScmError, ScmPort};
use review_types::diff::{merge_context_matches, ContextRetrievalResult, EnrichedDiff};
use review_types::RepositoryIdentifier;
use strategies::CoChangeIndex;
use tracing::{instrument, warn};

/// Inputs the caller must supply because they come from outside the diff
/// itself: a file listing for the sibling-file strategy, a precomputed
/// co-change index, and the knobs for expansion/policy/PR-metadata fetch.
pub struct ContextRequest<'a> {
    pub repository_id: &'a RepositoryIdentifier,
    pub opaque_repo_id: &'a str,
    pub change_request_id: u64,
    pub head_ref: &'a str,
    pub repo_file_listing: Vec<String>,
    pub co_change_index: CoChangeIndex,
    pub max_expand_file_lines: usize,
    pub max_expand_total_bytes: usize,
    pub max_policy_chars: usize,
    pub include_pr_metadata: bool,
    pub max_pr_commits: usize,
}

/// Diff fetch failure is fatal (spec §4.6 failure policy); everything after
/// that point degrades gracefully.
#[instrument(skip(scm, request))]
pub async fn retrieve_enriched_diff(scm: &ScmPort, request: ContextRequest<'_>) -> Result<EnrichedDiff, ScmError> {
    let diff = scm.fetch_diff(request.opaque_repo_id, review_types::ChangeRequestIdentifier::new(request.change_request_id as i64).unwrap()).await?;

    let (sibling_result, import_result, cochange_result) = tokio::join!(
        run_strategy(|| async {
            Ok(strategies::same_package_sibling_strategy(&diff, &request.repo_file_listing))
        }),
        run_strategy(|| async { Ok(strategies::import_reference_strategy(&diff)) }),
        run_strategy(|| async { Ok(strategies::co_change_strategy(&diff, &request.co_change_index)) }),
    );

    let strategy_metadata = vec![sibling_result, import_result, cochange_result];
    let all_matches = strategy_metadata.iter().flat_map(|r| r.matches.clone()).collect();
    let context_matches = merge_context_matches(all_matches);

    let mut expansion_candidates = Vec::with_capacity(diff.files.len());
    for file in &diff.files {
        let path = file.display_path();
        if path.is_empty() {
            continue;
        }
        match scm.fetch_file_at_ref(request.opaque_repo_id, path, request.head_ref).await {
            Ok(Some(bytes)) => {
                expansion_candidates.push((path.to_string(), String::from_utf8_lossy(&bytes).into_owned()));
            }
            Ok(None) => {}
            Err(e) => warn!(path, error = %e, "failed to fetch file for expansion, skipping"),
        }
    }
    let expansion = expansion::expand_small_files(
        expansion_candidates,
        request.max_expand_file_lines,
        request.max_expand_total_bytes,
    );

    let policies = policies::fetch_repository_policies(
        scm,
        request.opaque_repo_id,
        request.head_ref,
        request.max_policy_chars,
    )
    .await;

    let pr_metadata = if request.include_pr_metadata {
        let change_request_id = review_types::ChangeRequestIdentifier::new(request.change_request_id as i64).unwrap();
        match scm.fetch_pr_metadata(request.opaque_repo_id, change_request_id).await {
            Ok(meta) => Some(policies::build_pr_metadata(
                meta.title,
                meta.description,
                meta.author,
                meta.labels,
                meta.commit_messages,
                request.max_pr_commits,
            )),
            Err(e) => {
                warn!(error = %e, "failed to fetch PR metadata, omitting from enrichment");
                None
            }
        }
    } else {
        None
    };

    Ok(EnrichedDiff {
        diff,
        repository_identifier: request.repository_id.clone(),
        context_matches,
        strategy_metadata,
        pr_metadata,
        repository_policies: policies,
        files_expanded: expansion.files_expanded,
        files_skipped: expansion.files_skipped,
    })
}

/// Runs one strategy, converting a panic-free error into a non-fatal
/// `ContextRetrievalResult` carrying the error message (spec §4.6 failure
/// policy: "it is logged and omitted from the enrichment").
async fn run_strategy<F, Fut>(f: F) -> ContextRetrievalResult
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<ContextRetrievalResult, String>>,
{
    let t0 = Instant::now();
    match f().await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "context strategy failed, omitting from enrichment");
            ContextRetrievalResult {
                strategy: "unknown".to_string(),
                matches: Vec::new(),
                execution_millis: t0.elapsed().as_millis(),
                candidate_count: 0,
                high_confidence_count: 0,
                error: Some(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_types::diff::{ContextReason, DiffDocument};

    #[tokio::test]
    async fn run_strategy_passes_through_successful_results() {
        let result = run_strategy(|| async {
            Ok(ContextRetrievalResult {
                strategy: "test".to_string(),
                matches: vec![],
                execution_millis: 0,
                candidate_count: 0,
                high_confidence_count: 0,
                error: None,
            })
        })
        .await;
        assert_eq!(result.strategy, "test");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn run_strategy_captures_failure_as_metadata() {
        let result: ContextRetrievalResult = run_strategy(|| async { Err("boom".to_string()) }).await;
        assert_eq!(result.error.as_deref(), Some("boom"));
        assert!(result.matches.is_empty());
    }

    #[test]
    fn merge_after_running_strategies_still_sorts_descending() {
        let diff = DiffDocument::default();
        let _ = diff;
        let matches = vec![
            review_types::diff::ContextMatch {
                file_path: "a.rs".into(),
                reason: ContextReason::SiblingFile,
                confidence: 0.3,
                evidence: String::new(),
            },
            review_types::diff::ContextMatch {
                file_path: "b.rs".into(),
                reason: ContextReason::DirectImport,
                confidence: 0.9,
                evidence: String::new(),
            },
        ];
        let merged = merge_context_matches(matches);
        assert_eq!(merged[0].file_path, "b.rs");
    }
}
