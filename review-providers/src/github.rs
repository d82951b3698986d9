//! GitHub REST v3 provider client.

use reqwest::Client;
use review_types::diff::{DiffDocument, PrMetadata};
use review_types::review::ReviewResult;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{ScmError, ScmResult};
use crate::parser::parse_unified_diff;

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: Client,
    base_api: String,
    token: String,
}

impl GitHubClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self { http, base_api, token }
    }

    pub async fn fetch_diff(&self, repository_id: &str, change_request_id: u64) -> ScmResult<DiffDocument> {
        let url = format!("{}/repos/{}/pulls/{}", self.base_api, repository_id, change_request_id);
        let raw = self
            .http
            .get(url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3.diff")
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(parse_unified_diff(&raw))
    }

    pub async fn publish_comments(
        &self,
        repository_id: &str,
        change_request_id: u64,
        result: &ReviewResult,
    ) -> ScmResult<()> {
        let url = format!(
            "{}/repos/{}/issues/{}/comments",
            self.base_api, repository_id, change_request_id
        );
        for issue in &result.issues {
            let body = format!("**{:?}** `{}`: {}\n\n{}", issue.severity, issue.file, issue.title, issue.suggestion);
            #[derive(serde::Serialize)]
            struct Req<'a> {
                body: &'a str,
            }
            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("token {}", self.token))
                .json(&Req { body: &body })
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(ScmError::Provider(crate::errors::ProviderError::HttpStatus(
                    resp.status().as_u16(),
                )));
            }
            debug!(file = %issue.file, "published github comment");
        }
        Ok(())
    }

    /// Recursive listing of every blob path in the tree at `git_ref`, used by
    /// the same-package/sibling-file context strategy (spec §4.6 step 2).
    /// Single-page call; very large monorepos may be truncated by GitHub's
    /// own tree-size cap, which is acceptable degradation for a best-effort
    /// context signal.
    pub async fn list_repository_files(&self, repository_id: &str, git_ref: &str) -> ScmResult<Vec<String>> {
        let url = format!("{}/repos/{}/git/trees/{}?recursive=1", self.base_api, repository_id, git_ref);
        let tree: GitHubTree = self
            .http
            .get(url)
            .header("Authorization", format!("token {}", self.token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tree
            .tree
            .into_iter()
            .filter(|e| e.entry_type == "blob")
            .map(|e| e.path)
            .collect())
    }

    /// Fetches title/description/author/labels and the commit list for the
    /// pull request (spec §4.6 step 5). Commit-count capping happens in
    /// `review_context::policies::build_pr_metadata`.
    pub async fn fetch_pr_metadata(&self, repository_id: &str, change_request_id: u64) -> ScmResult<PrMetadata> {
        let pr_url = format!("{}/repos/{}/pulls/{}", self.base_api, repository_id, change_request_id);
        let pr: GitHubPullRequest = self
            .http
            .get(pr_url)
            .header("Authorization", format!("token {}", self.token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let commits_url = format!(
            "{}/repos/{}/pulls/{}/commits",
            self.base_api, repository_id, change_request_id
        );
        let commits: Vec<GitHubCommit> = self
            .http
            .get(commits_url)
            .header("Authorization", format!("token {}", self.token))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(PrMetadata {
            title: pr.title,
            description: pr.body.unwrap_or_default(),
            author: pr.user.login,
            labels: pr.labels.into_iter().map(|l| l.name).collect(),
            commit_messages: commits.into_iter().map(|c| c.commit.message).collect(),
        })
    }

    pub async fn fetch_file_at_ref(
        &self,
        repository_id: &str,
        path: &str,
        git_ref: &str,
    ) -> ScmResult<Option<Vec<u8>>> {
        let url = format!(
            "{}/repos/{}/contents/{}?ref={}",
            self.base_api, repository_id, path, git_ref
        );
        let resp = self
            .http
            .get(url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3.raw")
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }
}

#[derive(Debug, Deserialize)]
struct GitHubPullRequest {
    title: String,
    body: Option<String>,
    user: GitHubUser,
    #[serde(default)]
    labels: Vec<GitHubLabel>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GitHubLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GitHubCommit {
    commit: GitHubCommitDetail,
}

#[derive(Debug, Deserialize)]
struct GitHubCommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitHubTree {
    tree: Vec<GitHubTreeEntry>,
}

#[derive(Debug, Deserialize)]
struct GitHubTreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}
