use std::path::{Path, PathBuf};

use git2::{Cred, FetchOptions, RemoteCallbacks};

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    #[error("checkout of branch {branch} failed: {source}")]
    Checkout {
        branch: String,
        #[source]
        source: git2::Error,
    },
}

/// Clones `branch` of `repo_url` to `dest` at depth 1, authenticating with an
/// HTTPS token (spec §4.9 step 1: "shallow workspace ... depth 1 and auth
/// token from the configured SCM credentials"). `dest` must not already exist.
pub fn clone_shallow_with_token(
    repo_url: &str,
    branch: &str,
    token: &str,
    dest: &Path,
) -> Result<PathBuf, GitError> {
    let token = token.to_string();

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username, _allowed| Cred::userpass_plaintext(&token, ""));

    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(callbacks);
    fetch_options.depth(1);

    let mut builder = git2::build::RepoBuilder::new();
    builder.fetch_options(fetch_options);
    builder.branch(branch);

    tracing::info!(repo_url, branch, dest = %dest.display(), "cloning shallow workspace");

    builder.clone(repo_url, dest).map_err(|source| {
        if source.class() == git2::ErrorClass::Checkout {
            GitError::Checkout { branch: branch.to_string(), source }
        } else {
            GitError::Git(source)
        }
    })?;

    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_of_nonexistent_host_fails_with_git_error() {
        let dest = std::env::temp_dir().join("review-sandbox-git-test-nonexistent");
        let result = clone_shallow_with_token(
            "https://nonexistent.invalid/owner/repo.git",
            "main",
            "token",
            &dest,
        );
        assert!(result.is_err());
    }
}
