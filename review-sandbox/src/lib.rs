//! C9: container analysis engine. Used only for `AGENTIC` mode (spec §4.9):
//! clone the target branch to a shallow ephemeral workspace, detect test
//! frameworks by marker file, run each inside a resource-limited sandbox,
//! parse its output, run in-process security detectors over the checkout,
//! and return a combined bundle for C7's accumulator.

pub mod container;
pub mod framework;
pub mod output_parser;
pub mod security;

use std::path::Path;
use std::time::Duration;

use bollard::Docker;
use review_types::state::{ContainerRunBuilder, SecurityFinding, TestExecutionResult};

pub use container::SandboxError;

const WORKSPACE_MOUNT: &str = "/workspace/repo";

/// Source ignored while walking a checkout for security scanning, matching
/// the directories a build never wants analyzed.
const IGNORED_DIRS: &[&str] = &[".git", "node_modules", "target", "vendor", "dist", "build"];

pub struct AnalysisBundle {
    pub test_results: Vec<TestExecutionResult>,
    pub security_findings: Vec<SecurityFinding>,
}

pub struct AnalysisRequest {
    pub repo_url: String,
    pub branch: String,
    pub scm_token: String,
    pub runner_image: String,
    pub run_timeout: Duration,
}

/// Runs the full C9 pipeline against an ephemeral temp directory that is
/// removed when this function returns (success or failure).
pub async fn analyze(docker: &Docker, request: &AnalysisRequest) -> Result<AnalysisBundle, SandboxError> {
    let workdir = tempfile::tempdir()?;
    let repo_dir = workdir.path().join("repo");

    services::git::clone_shallow_with_token(
        &request.repo_url,
        &request.branch,
        &request.scm_token,
        &repo_dir,
    )?;

    let frameworks = framework::detect_frameworks(&repo_dir);

    let mut test_results = Vec::with_capacity(frameworks.len());
    for kind in frameworks {
        let run = ContainerRunBuilder::new(request.runner_image.as_str())
            .timeout(request.run_timeout)
            .mount(repo_dir.clone(), WORKSPACE_MOUNT)
            .command(kind.test_command())
            .build()
            .expect("builder defaults are always positive");

        let outcome = container::execute(docker, &run).await?;
        test_results.push(output_parser::parse(kind, &outcome.stdout));
    }

    let security_findings = scan_checkout(&repo_dir);

    Ok(AnalysisBundle { test_results, security_findings })
}

fn scan_checkout(repo_dir: &Path) -> Vec<SecurityFinding> {
    let mut findings = Vec::new();
    for entry in walkdir::WalkDir::new(repo_dir)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path()))
    {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(entry.path()) else { continue };
        let relative = entry
            .path()
            .strip_prefix(repo_dir)
            .unwrap_or(entry.path())
            .display()
            .to_string();
        findings.extend(security::scan_all(&relative, &content, 0));
    }
    findings
}

fn is_ignored(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| IGNORED_DIRS.contains(&name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_checkout_finds_dangerous_pattern_and_skips_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "os.system(user_cmd)\n").unwrap();

        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/lib.js"), "eval(x)\n").unwrap();

        let findings = scan_checkout(dir.path());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "app.py");
    }
}
