//! Review lifecycle FSM (C11) and the container/sandbox value types used by
//! C9/C10 (spec §3, §4.9, §4.10).

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// `PENDING -> PROCESSING -> {COMPLETED | FAILED}`. Terminal states never
/// revert (spec §8 invariant 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal FSM edge.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ReviewStatus::*;
        match (self, next) {
            (Pending, Processing) => true,
            (Processing, Completed) | (Processing, Failed) => true,
            (same, other) if same == other => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewState {
    pub repository_id: String,
    pub change_request_id: u64,
    pub provider: String,
    pub request_id: uuid::Uuid,
    pub status: ReviewStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub issues_json: Option<serde_json::Value>,
    pub notes_json: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// `{image, memoryBytes>0, nanoCpus>0, timeout, workingDir, mounts, command,
/// env, readOnly, networkDisabled, noNewPrivileges, autoRemove}` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRun {
    pub image: String,
    pub memory_bytes: i64,
    pub nano_cpus: i64,
    pub timeout: std::time::Duration,
    pub working_dir: String,
    pub mounts: Vec<(PathBuf, String)>,
    pub command: Vec<String>,
    pub env: HashMap<String, String>,
    pub read_only: bool,
    pub network_disabled: bool,
    pub no_new_privileges: bool,
    pub auto_remove: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ContainerRunError {
    #[error("memoryBytes must be positive, got {0}")]
    NonPositiveMemory(i64),
    #[error("nanoCpus must be positive, got {0}")]
    NonPositiveCpu(i64),
}

/// Builder enforcing the §5 invariant that memory/CPU must be positive.
pub struct ContainerRunBuilder {
    image: String,
    memory_bytes: i64,
    nano_cpus: i64,
    timeout: std::time::Duration,
    working_dir: String,
    mounts: Vec<(PathBuf, String)>,
    command: Vec<String>,
    env: HashMap<String, String>,
}

impl ContainerRunBuilder {
    /// Defaults mirror §5: 2 GiB memory, 2 cores, `CI=true` always set.
    pub fn new(image: impl Into<String>) -> Self {
        let mut env = HashMap::new();
        env.insert("CI".to_string(), "true".to_string());
        Self {
            image: image.into(),
            memory_bytes: 2 * 1024 * 1024 * 1024,
            nano_cpus: 2_000_000_000,
            timeout: std::time::Duration::from_secs(300),
            working_dir: "/workspace/repo".to_string(),
            mounts: Vec::new(),
            command: Vec::new(),
            env,
        }
    }

    pub fn memory_bytes(mut self, bytes: i64) -> Self {
        self.memory_bytes = bytes;
        self
    }

    pub fn nano_cpus(mut self, cpus: i64) -> Self {
        self.nano_cpus = cpus;
        self
    }

    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn mount(mut self, host: PathBuf, container: impl Into<String>) -> Self {
        self.mounts.push((host, container.into()));
        self
    }

    pub fn command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<ContainerRun, ContainerRunError> {
        if self.memory_bytes <= 0 {
            return Err(ContainerRunError::NonPositiveMemory(self.memory_bytes));
        }
        if self.nano_cpus <= 0 {
            return Err(ContainerRunError::NonPositiveCpu(self.nano_cpus));
        }
        Ok(ContainerRun {
            image: self.image,
            memory_bytes: self.memory_bytes,
            nano_cpus: self.nano_cpus,
            timeout: self.timeout,
            working_dir: self.working_dir,
            mounts: self.mounts,
            command: self.command,
            env: self.env,
            read_only: true,
            network_disabled: true,
            no_new_privileges: true,
            auto_remove: true,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRunOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub wall_duration: std::time::Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub name: String,
    pub passed: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestExecutionResult {
    pub framework: String,
    pub passed: u32,
    pub failed: u32,
    pub cases: Vec<TestCaseResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl FindingSeverity {
    /// `{CRITICAL:10, HIGH:7, MEDIUM:4, LOW:1, INFO:0.1}` (spec §4.9.5).
    pub fn weight(self) -> f32 {
        match self {
            Self::Critical => 10.0,
            Self::High => 7.0,
            Self::Medium => 4.0,
            Self::Low => 1.0,
            Self::Info => 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityFinding {
    pub detector: String,
    pub severity: FindingSeverity,
    pub message: String,
    pub file: String,
    pub line: u32,
}

/// `{APPROVED, MANUAL, REJECTED}` as a tagged variant, never a boolean flag
/// plus comment (spec §9 design note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "UPPERCASE")]
pub enum ValidationResult {
    Approved { risk_score: f32 },
    Manual { reason: String },
    Rejected { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsm_allows_only_legal_successors() {
        assert!(ReviewStatus::Pending.can_transition_to(ReviewStatus::Processing));
        assert!(ReviewStatus::Processing.can_transition_to(ReviewStatus::Completed));
        assert!(ReviewStatus::Processing.can_transition_to(ReviewStatus::Failed));
        assert!(!ReviewStatus::Pending.can_transition_to(ReviewStatus::Completed));
        assert!(!ReviewStatus::Completed.can_transition_to(ReviewStatus::Processing));
        assert!(!ReviewStatus::Failed.can_transition_to(ReviewStatus::Pending));
    }

    #[test]
    fn container_run_builder_rejects_non_positive_resources() {
        assert!(ContainerRunBuilder::new("alpine").memory_bytes(0).build().is_err());
        assert!(ContainerRunBuilder::new("alpine").nano_cpus(-1).build().is_err());
        let run = ContainerRunBuilder::new("alpine").build().unwrap();
        assert!(run.network_disabled);
        assert!(run.no_new_privileges);
        assert_eq!(run.env.get("CI").map(String::as_str), Some("true"));
    }
}
