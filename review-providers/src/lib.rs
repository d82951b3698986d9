//! Provider-agnostic SCM port (C6 step 1): fetch a unified diff, parse it,
//! and publish review comments back. Enum-dispatch over concrete clients,
//! the same shape used for the pipeline's stream broker.

pub mod errors;
pub mod github;
pub mod gitlab;
pub mod parser;

use review_types::diff::{DiffDocument, PrMetadata};
use review_types::review::ReviewResult;
use review_types::{ChangeRequestIdentifier, Provider};

pub use errors::{ProviderError, ScmError, ScmResult};

#[derive(Debug, Clone)]
pub struct ScmCredentials {
    pub base_api: String,
    pub token: String,
}

#[derive(Debug, Clone)]
pub enum ScmPort {
    GitHub(github::GitHubClient),
    GitLab(gitlab::GitLabClient),
}

impl ScmPort {
    pub fn new(provider: Provider, credentials: ScmCredentials) -> ScmResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent("review-pipeline/0.1")
            .build()
            .map_err(ScmError::from)?;
        Ok(match provider {
            Provider::Github => {
                ScmPort::GitHub(github::GitHubClient::new(http, credentials.base_api, credentials.token))
            }
            Provider::Gitlab => {
                ScmPort::GitLab(gitlab::GitLabClient::new(http, credentials.base_api, credentials.token))
            }
        })
    }

    /// Fetches and parses the unified diff for a change request (spec §4.6.1).
    pub async fn fetch_diff(&self, repository_id: &str, change_request_id: ChangeRequestIdentifier) -> ScmResult<DiffDocument> {
        match self {
            ScmPort::GitHub(c) => c.fetch_diff(repository_id, change_request_id.value()).await,
            ScmPort::GitLab(c) => c.fetch_diff(repository_id, change_request_id.value()).await,
        }
    }

    /// Publishes review comments to the change request. Accepted means the
    /// provider has durably recorded the comment (spec §4.8, §5 "never
    /// acknowledge until the publish is accepted").
    pub async fn publish_comments(
        &self,
        repository_id: &str,
        change_request_id: ChangeRequestIdentifier,
        result: &ReviewResult,
    ) -> ScmResult<()> {
        match self {
            ScmPort::GitHub(c) => c.publish_comments(repository_id, change_request_id.value(), result).await,
            ScmPort::GitLab(c) => c.publish_comments(repository_id, change_request_id.value(), result).await,
        }
    }

    /// Title, description, author, labels, and commit messages for the
    /// change request (spec §4.6 step 5).
    pub async fn fetch_pr_metadata(&self, repository_id: &str, change_request_id: ChangeRequestIdentifier) -> ScmResult<PrMetadata> {
        match self {
            ScmPort::GitHub(c) => c.fetch_pr_metadata(repository_id, change_request_id.value()).await,
            ScmPort::GitLab(c) => c.fetch_pr_metadata(repository_id, change_request_id.value()).await,
        }
    }

    /// Recursive blob-path listing at a ref, used by the sibling-file context
    /// strategy (spec §4.6 step 2).
    pub async fn list_repository_files(&self, repository_id: &str, git_ref: &str) -> ScmResult<Vec<String>> {
        match self {
            ScmPort::GitHub(c) => c.list_repository_files(repository_id, git_ref).await,
            ScmPort::GitLab(c) => c.list_repository_files(repository_id, git_ref).await,
        }
    }

    /// Raw file contents at a ref, used by context-retrieval strategies that
    /// need to read sibling files outside the diff (spec §4.6.3).
    pub async fn fetch_file_at_ref(
        &self,
        repository_id: &str,
        path: &str,
        git_ref: &str,
    ) -> ScmResult<Option<Vec<u8>>> {
        match self {
            ScmPort::GitHub(c) => c.fetch_file_at_ref(repository_id, path, git_ref).await,
            ScmPort::GitLab(c) => c.fetch_file_at_ref(repository_id, path, git_ref).await,
        }
    }
}
