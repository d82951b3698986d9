//! Orchestration glue tying C6 (diff/context) → C7 (prompt + streaming LLM)
//! → C9 (container analysis, AGENTIC only) → C10 (fix-safety) → C8 (result
//! publish) together, following `mr-reviewer::lib.rs::run_review`'s
//! single-entry-point shape: none of the crates below call each other
//! directly, this module is where the pipeline is actually composed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use bollard::Docker;
use futures::StreamExt;
use review_broker::{result_hash_key, status_channel, BrokerClient};
use review_context::{retrieve_enriched_diff, ContextRequest};
use review_core::{parse_and_filter, validate_fix};
use review_providers::{ScmCredentials, ScmPort};
use review_sandbox::AnalysisRequest;
use review_store::ReviewStateStore;
use review_types::review::ReviewResult;
use review_types::state::{ReviewStatus, SecurityFinding, ValidationResult};
use review_types::{AsyncReviewRequest, Provider, ReviewMode};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::error::OrchestratorError;

/// Knobs that do not vary per-request; one `OrchestratorConfig` is shared by
/// every task spawned from the consumer loop.
pub struct OrchestratorConfig {
    pub scm_credentials: HashMap<Provider, ScmCredentials>,
    pub confidence_threshold: f32,
    pub llm_timeout: Duration,
    /// Recorded verbatim into `ReviewResult`/the result hash; sourced from
    /// the same `LlmModelConfig` used to build the `LlmPort` (spec §4.7
    /// output, §6 result-hash fields `llmProvider`/`llmModel`).
    pub llm_provider_name: String,
    pub llm_model_name: String,
    pub runner_image: String,
    pub sandbox_timeout: Duration,
    pub max_expand_file_lines: usize,
    pub max_expand_total_bytes: usize,
    pub max_policy_chars: usize,
    pub include_pr_metadata: bool,
    pub max_pr_commits: usize,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    broker: BrokerClient,
    store: Arc<Mutex<ReviewStateStore>>,
    llm: ai_llm_service::LlmPort,
    docker: Option<Docker>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        broker: BrokerClient,
        store: Arc<Mutex<ReviewStateStore>>,
        llm: ai_llm_service::LlmPort,
        docker: Option<Docker>,
    ) -> Self {
        Self { config, broker, store, llm, docker }
    }

    /// Runs the full pipeline for one request and writes the C8 result
    /// artifacts (hash + status channel). Errors are both recorded in the
    /// result hash/state store and returned, so the caller (C5) knows not to
    /// acknowledge on a transient failure (spec §4.5, §7).
    #[instrument(skip(self, request), fields(request_id = %request.request_id))]
    pub async fn process(&self, request: AsyncReviewRequest) -> Result<(), OrchestratorError> {
        let t0 = Instant::now();
        let repository_id = request.repository_id.opaque_id.clone();
        let change_request_id = request.change_request_id.value();
        let provider_str = request.provider.as_str();

        {
            let mut store = self.store.lock().await;
            store
                .save(request.request_id, &repository_id, change_request_id as i64, provider_str, None, None)
                .await?;
            store.update_state(request.request_id, ReviewStatus::Processing).await?;
        }

        let outcome = match request.review_mode {
            ReviewMode::Diff => self.run_diff_mode(&request).await,
            ReviewMode::Agentic => self.run_agentic_mode(&request).await,
        };

        let processing_millis = t0.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                self.publish_success(&request, &result, processing_millis).await?;
                let mut store = self.store.lock().await;
                store
                    .update_result_and_state(
                        request.request_id,
                        Some(serde_json::to_value(&result.issues)?),
                        Some(serde_json::to_value(&result.non_blocking_notes)?),
                        None,
                        ReviewStatus::Completed,
                    )
                    .await?;
                Ok(())
            }
            Err(e) => {
                self.publish_failure(&request, &e, processing_millis).await?;
                let mut store = self.store.lock().await;
                store
                    .update_result_and_state(request.request_id, None, None, Some(&e.to_string()), ReviewStatus::Failed)
                    .await?;
                Err(e)
            }
        }
    }

    /// C6 → C7 → C10 (over each suggested fix, with no security findings to
    /// check against since DIFF mode never runs the sandbox).
    async fn run_diff_mode(&self, request: &AsyncReviewRequest) -> Result<ReviewResult, OrchestratorError> {
        let scm = self.scm_port(request)?;
        let head_ref = pr_head_ref(request);

        let repo_file_listing = scm
            .list_repository_files(&request.repository_id.opaque_id, &head_ref)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to list repository tree, sibling-file strategy degraded");
                Vec::new()
            });

        let context_request = ContextRequest {
            repository_id: &request.repository_id,
            opaque_repo_id: &request.repository_id.opaque_id,
            change_request_id: request.change_request_id.value(),
            head_ref: head_ref.as_str(),
            repo_file_listing,
            co_change_index: Default::default(),
            max_expand_file_lines: self.config.max_expand_file_lines,
            max_expand_total_bytes: self.config.max_expand_total_bytes,
            max_policy_chars: self.config.max_policy_chars,
            include_pr_metadata: self.config.include_pr_metadata,
            max_pr_commits: self.config.max_pr_commits,
        };
        let enriched = retrieve_enriched_diff(&scm, context_request).await?;

        let mut result = self.run_llm(None, &enriched).await?;
        self.apply_fix_safety(&mut result, &[]);
        Ok(result)
    }

    /// C9 → C7 (diff still drives the prompt) → C10 (now with real security
    /// findings from the sandboxed checkout).
    async fn run_agentic_mode(&self, request: &AsyncReviewRequest) -> Result<ReviewResult, OrchestratorError> {
        let scm = self.scm_port(request)?;
        let head_ref = pr_head_ref(request);
        let credentials = self
            .config
            .scm_credentials
            .get(&request.provider)
            .ok_or(OrchestratorError::MissingCredentials(request.provider))?;

        let repo_file_listing = scm
            .list_repository_files(&request.repository_id.opaque_id, &head_ref)
            .await
            .unwrap_or_default();

        let context_request = ContextRequest {
            repository_id: &request.repository_id,
            opaque_repo_id: &request.repository_id.opaque_id,
            change_request_id: request.change_request_id.value(),
            head_ref: head_ref.as_str(),
            repo_file_listing,
            co_change_index: Default::default(),
            max_expand_file_lines: self.config.max_expand_file_lines,
            max_expand_total_bytes: self.config.max_expand_total_bytes,
            max_policy_chars: self.config.max_policy_chars,
            include_pr_metadata: self.config.include_pr_metadata,
            max_pr_commits: self.config.max_pr_commits,
        };
        let enriched = retrieve_enriched_diff(&scm, context_request).await?;

        let docker = self.docker.as_ref().ok_or(OrchestratorError::SandboxUnavailable)?;
        let analysis_request = AnalysisRequest {
            repo_url: clone_url(request.provider, &request.repository_id.opaque_id, &credentials.base_api),
            branch: head_ref,
            scm_token: credentials.token.clone(),
            runner_image: self.config.runner_image.clone(),
            run_timeout: self.config.sandbox_timeout,
        };
        let bundle = review_sandbox::analyze(docker, &analysis_request).await?;

        let mut result = self.run_llm(None, &enriched).await?;
        self.apply_fix_safety(&mut result, &bundle.security_findings);
        Ok(result)
    }

    /// C7: builds the prompt, streams the completion under an absolute
    /// timeout, accumulates, and parses/filters.
    async fn run_llm(
        &self,
        ticket_context: Option<&str>,
        enriched: &review_types::diff::EnrichedDiff,
    ) -> Result<ReviewResult, OrchestratorError> {
        let system = ai_llm_service::prompt::build_system_prompt();
        let user = ai_llm_service::prompt::build_user_prompt(ticket_context, enriched);

        let mut stream = self
            .llm
            .stream_completion_with_timeout(&user, Some(&system), self.config.llm_timeout);

        let mut accumulator = review_core::DeltaAccumulator::new();
        while let Some(delta) = stream.next().await {
            accumulator.push(&delta?);
        }
        let buffer = accumulator.finish();

        let result = parse_and_filter(
            &buffer,
            &self.config.llm_provider_name,
            &self.config.llm_model_name,
            self.config.confidence_threshold,
        )?;
        Ok(result)
    }

    /// C10: validates every issue carrying a suggested fix; a non-`Approved`
    /// outcome strips the auto-apply action (spec end-to-end scenario 6).
    fn apply_fix_safety(&self, result: &mut ReviewResult, security_findings: &[SecurityFinding]) {
        for issue in &mut result.issues {
            let Some(encoded) = issue.suggested_fix.take() else {
                continue;
            };
            let fix_diff = match base64::engine::general_purpose::STANDARD.decode(&encoded) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(_) => encoded.clone(),
            };
            let confidence = issue.effective_confidence();
            match validate_fix(&fix_diff, &issue.file, confidence, security_findings) {
                ValidationResult::Approved { .. } => {
                    issue.suggested_fix = Some(encoded);
                }
                ValidationResult::Manual { reason } => {
                    issue.confidence_explanation =
                        Some(format!("suggested fix held for manual review: {reason}"));
                }
                ValidationResult::Rejected { reason } => {
                    issue.confidence_explanation = Some(format!("suggested fix rejected: {reason}"));
                }
            }
        }
    }

    fn scm_port(&self, request: &AsyncReviewRequest) -> Result<ScmPort, OrchestratorError> {
        let credentials = self
            .config
            .scm_credentials
            .get(&request.provider)
            .ok_or(OrchestratorError::MissingCredentials(request.provider))?;
        Ok(ScmPort::new(request.provider, credentials.clone())?)
    }

    /// C8 step 1-2: write the result hash, then publish the status channel
    /// event (hash-before-publish ordering per §5).
    async fn publish_success(
        &self,
        request: &AsyncReviewRequest,
        result: &ReviewResult,
        processing_millis: u64,
    ) -> Result<(), OrchestratorError> {
        let mut fields = HashMap::new();
        fields.insert("requestId".to_string(), request.request_id.to_string());
        fields.insert("status".to_string(), "COMPLETED".to_string());
        fields.insert("request".to_string(), serde_json::to_string(request)?);
        fields.insert("result".to_string(), serde_json::to_string(result)?);
        fields.insert("provider".to_string(), request.provider.as_str().to_string());
        fields.insert("repositoryId".to_string(), request.repository_id.opaque_id.clone());
        fields.insert("changeRequestId".to_string(), request.change_request_id.value().to_string());
        fields.insert("llmProvider".to_string(), result.llm_provider.clone());
        fields.insert("llmModel".to_string(), result.llm_model.clone());
        fields.insert("processingTimeMs".to_string(), processing_millis.to_string());
        fields.insert("completedAt".to_string(), chrono::Utc::now().to_rfc3339());

        self.broker.put_hash(&result_hash_key(&request.request_id.to_string()), fields).await?;
        self.broker
            .publish_topic(&status_channel(&request.request_id.to_string()), "COMPLETED")
            .await?;
        info!(request_id = %request.request_id, processing_millis, "review completed");
        Ok(())
    }

    /// C8 step 3: on failure, the hash still gets written (with the error)
    /// before the channel publish, preserving the same ordering guarantee.
    async fn publish_failure(
        &self,
        request: &AsyncReviewRequest,
        error: &OrchestratorError,
        processing_millis: u64,
    ) -> Result<(), OrchestratorError> {
        let mut fields = HashMap::new();
        fields.insert("requestId".to_string(), request.request_id.to_string());
        fields.insert("status".to_string(), "FAILED".to_string());
        fields.insert("request".to_string(), serde_json::to_string(request)?);
        fields.insert("error".to_string(), error.to_string());
        fields.insert("provider".to_string(), request.provider.as_str().to_string());
        fields.insert("repositoryId".to_string(), request.repository_id.opaque_id.clone());
        fields.insert("changeRequestId".to_string(), request.change_request_id.value().to_string());
        fields.insert("processingTimeMs".to_string(), processing_millis.to_string());
        fields.insert("completedAt".to_string(), chrono::Utc::now().to_rfc3339());

        self.broker.put_hash(&result_hash_key(&request.request_id.to_string()), fields).await?;
        self.broker
            .publish_topic(&status_channel(&request.request_id.to_string()), "FAILED")
            .await?;
        warn!(request_id = %request.request_id, error = %error, "review failed");
        Ok(())
    }
}

/// The webhook payload carries only `changeRequestId`, not a branch name, so
/// the head ref is derived from the provider's change-request-scoped ref
/// (GitHub's `refs/pull/<n>/head`, GitLab's `refs/merge-requests/<n>/head`)
/// rather than threaded through as a separate field.
fn pr_head_ref(request: &AsyncReviewRequest) -> String {
    let n = request.change_request_id.value();
    match request.provider {
        Provider::Github => format!("refs/pull/{n}/head"),
        Provider::Gitlab => format!("refs/merge-requests/{n}/head"),
    }
}

/// Token-authenticated HTTPS clone URL for C9's shallow clone, built from the
/// SCM credentials already resolved for the request's provider.
fn clone_url(provider: Provider, opaque_repo_id: &str, base_api: &str) -> String {
    let host = match provider {
        Provider::Github => "github.com",
        Provider::Gitlab => base_api
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .split('/')
            .next()
            .unwrap_or("gitlab.com"),
    };
    format!("https://{host}/{opaque_repo_id}.git")
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_types::{ChangeRequestIdentifier, RepositoryIdentifier};

    fn request(provider: Provider) -> AsyncReviewRequest {
        AsyncReviewRequest {
            request_id: uuid::Uuid::new_v4(),
            provider,
            repository_id: RepositoryIdentifier::new(provider, "owner/repo"),
            change_request_id: ChangeRequestIdentifier::new(42).unwrap(),
            review_mode: ReviewMode::Diff,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn pr_head_ref_differs_by_provider() {
        assert_eq!(pr_head_ref(&request(Provider::Github)), "refs/pull/42/head");
        assert_eq!(pr_head_ref(&request(Provider::Gitlab)), "refs/merge-requests/42/head");
    }

    #[test]
    fn clone_url_builds_https_github_remote() {
        let url = clone_url(Provider::Github, "owner/repo", "https://api.github.com");
        assert_eq!(url, "https://github.com/owner/repo.git");
    }

    #[test]
    fn clone_url_derives_gitlab_host_from_base_api() {
        let url = clone_url(Provider::Gitlab, "owner/repo", "https://gitlab.example.com/api/v4");
        assert_eq!(url, "https://gitlab.example.com/owner/repo.git");
    }
}
