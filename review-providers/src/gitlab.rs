//! GitLab REST v4 provider client.

use reqwest::Client;
use review_types::diff::{DiffDocument, PrMetadata};
use review_types::review::ReviewResult;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{ScmError, ScmResult};
use crate::parser::{looks_like_binary_patch, parse_unified_diff};

#[derive(Debug, Clone)]
pub struct GitLabClient {
    http: Client,
    base_api: String,
    token: String,
}

impl GitLabClient {
    pub fn new(http: Client, base_api: String, token: String) -> Self {
        Self { http, base_api, token }
    }

    pub async fn fetch_diff(&self, repository_id: &str, change_request_id: u64) -> ScmResult<DiffDocument> {
        let url = format!(
            "{}/projects/{}/merge_requests/{}/diffs",
            self.base_api,
            urlencoding::encode(repository_id),
            change_request_id
        );
        let files: Vec<GitLabMrDiffFile> = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut raw = String::new();
        for f in &files {
            if let Some(d) = &f.diff {
                if looks_like_binary_patch(d) {
                    continue;
                }
                raw.push_str(&format!("--- a/{}\n+++ b/{}\n", f.old_path, f.new_path));
                raw.push_str(d);
                if !d.ends_with('\n') {
                    raw.push('\n');
                }
            }
        }
        Ok(parse_unified_diff(&raw))
    }

    pub async fn publish_comments(
        &self,
        repository_id: &str,
        change_request_id: u64,
        result: &ReviewResult,
    ) -> ScmResult<()> {
        let project = urlencoding::encode(repository_id).into_owned();
        for issue in &result.issues {
            let url = format!(
                "{}/projects/{}/merge_requests/{}/notes",
                self.base_api, project, change_request_id
            );
            let body = format!("**{:?}**: {}\n\n{}", issue.severity, issue.title, issue.suggestion);
            #[derive(serde::Serialize)]
            struct Req<'a> {
                body: &'a str,
            }
            let resp = self
                .http
                .post(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .json(&Req { body: &body })
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(ScmError::Provider(crate::errors::ProviderError::HttpStatus(
                    resp.status().as_u16(),
                )));
            }
            debug!(file = %issue.file, "published gitlab note");
        }
        Ok(())
    }

    /// Recursive listing of every blob path in the tree at `git_ref` (spec
    /// §4.6 step 2). Single-page call (GitLab's default `per_page`); large
    /// monorepos may be truncated, acceptable for a best-effort signal.
    pub async fn list_repository_files(&self, repository_id: &str, git_ref: &str) -> ScmResult<Vec<String>> {
        let url = format!(
            "{}/projects/{}/repository/tree?ref={}&recursive=true&per_page=100",
            self.base_api,
            urlencoding::encode(repository_id),
            urlencoding::encode(git_ref)
        );
        let entries: Vec<GitLabTreeEntry> = self
            .http
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.entry_type == "blob")
            .map(|e| e.path)
            .collect())
    }

    /// Fetches title/description/author/labels and commit list for the merge
    /// request (spec §4.6 step 5).
    pub async fn fetch_pr_metadata(&self, repository_id: &str, change_request_id: u64) -> ScmResult<PrMetadata> {
        let project = urlencoding::encode(repository_id).into_owned();
        let mr_url = format!("{}/projects/{}/merge_requests/{}", self.base_api, project, change_request_id);
        let mr: GitLabMergeRequest = self
            .http
            .get(mr_url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let commits_url = format!(
            "{}/projects/{}/merge_requests/{}/commits",
            self.base_api, project, change_request_id
        );
        let commits: Vec<GitLabCommit> = self
            .http
            .get(commits_url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(PrMetadata {
            title: mr.title,
            description: mr.description.unwrap_or_default(),
            author: mr.author.username,
            labels: mr.labels,
            commit_messages: commits.into_iter().map(|c| c.message).collect(),
        })
    }

    pub async fn fetch_file_at_ref(
        &self,
        repository_id: &str,
        path: &str,
        git_ref: &str,
    ) -> ScmResult<Option<Vec<u8>>> {
        let url = format!(
            "{}/projects/{}/repository/files/{}/raw?ref={}",
            self.base_api,
            urlencoding::encode(repository_id),
            urlencoding::encode(path),
            urlencoding::encode(git_ref)
        );
        let resp = self.http.get(url).header("PRIVATE-TOKEN", &self.token).send().await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        let bytes = resp.error_for_status()?.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }
}

#[derive(Debug, Deserialize)]
struct GitLabMrDiffFile {
    old_path: String,
    new_path: String,
    #[serde(default)]
    diff: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabMergeRequest {
    title: String,
    description: Option<String>,
    author: GitLabUser,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GitLabUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct GitLabCommit {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GitLabTreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}
