//! Sandboxed container execution via `bollard` (spec §4.9 step 3).
//!
//! Every run is configured with an explicit memory limit, a nanosecond CPU
//! quota, a read-only root filesystem, `no-new-privileges`, network disabled
//! by default, auto-remove on exit, and a single bind mount at
//! `/workspace/repo`. A hard wall-clock timeout races the container wait.

use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, LogsOptions, RemoveContainerOptions, WaitContainerOptions,
};
use bollard::models::HostConfig;
use futures::StreamExt;
use review_types::state::ContainerRun;

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("container timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("clone failed: {0}")]
    Clone(#[from] services::git::GitError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct ContainerRunOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
    pub wall_duration: std::time::Duration,
}

/// Builds the `HostConfig` implementing §5's resource-isolation invariants.
/// Pure and independently testable (no docker daemon needed).
pub fn host_config(run: &ContainerRun) -> HostConfig {
    let binds = run
        .mounts
        .iter()
        .map(|(host, container)| format!("{}:{}", host.display(), container))
        .collect();

    HostConfig {
        memory: Some(run.memory_bytes),
        nano_cpus: Some(run.nano_cpus),
        readonly_rootfs: Some(run.read_only),
        network_mode: Some(if run.network_disabled { "none".to_string() } else { "bridge".to_string() }),
        security_opt: if run.no_new_privileges { Some(vec!["no-new-privileges".to_string()]) } else { None },
        auto_remove: Some(run.auto_remove),
        binds: Some(binds),
        ..Default::default()
    }
}

fn container_config(run: &ContainerRun) -> Config<String> {
    let env = run.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

    Config {
        image: Some(run.image.clone()),
        cmd: Some(run.command.clone()),
        env: Some(env),
        working_dir: Some(run.working_dir.clone()),
        host_config: Some(host_config(run)),
        ..Default::default()
    }
}

/// Runs `run` to completion or until its `timeout` elapses, returning
/// captured stdout/stderr verbatim and the process exit code. On timeout the
/// container is killed and removed.
pub async fn execute(docker: &Docker, run: &ContainerRun) -> Result<ContainerRunOutcome, SandboxError> {
    let started = std::time::Instant::now();

    let name = format!("review-sandbox-{}", uuid::Uuid::new_v4());
    let options = CreateContainerOptions { name: name.clone(), platform: None };
    docker.create_container(Some(options), container_config(run)).await?;
    docker.start_container(&name, None::<bollard::query_parameters::StartContainerOptions>).await?;

    let wait = async {
        let mut stream = docker.wait_container(&name, None::<WaitContainerOptions<String>>);
        let mut exit_code = 0i64;
        while let Some(item) = stream.next().await {
            if let Ok(response) = item {
                exit_code = response.status_code;
            }
        }
        exit_code
    };

    let exit_code = match tokio::time::timeout(run.timeout, wait).await {
        Ok(code) => code,
        Err(_) => {
            let _ = docker.kill_container(&name, None::<bollard::query_parameters::KillContainerOptions>).await;
            let _ = docker
                .remove_container(&name, Some(RemoveContainerOptions { force: true, ..Default::default() }))
                .await;
            return Err(SandboxError::Timeout(run.timeout));
        }
    };

    let (stdout, stderr) = collect_logs(docker, &name).await?;

    if !run.auto_remove {
        let _ = docker.remove_container(&name, Some(RemoveContainerOptions { force: true, ..Default::default() })).await;
    }

    Ok(ContainerRunOutcome { stdout, stderr, exit_code, wall_duration: started.elapsed() })
}

async fn collect_logs(docker: &Docker, name: &str) -> Result<(String, String), SandboxError> {
    let options = LogsOptions::<String> { stdout: true, stderr: true, ..Default::default() };
    let mut stream = docker.logs(name, Some(options));

    let mut stdout = String::new();
    let mut stderr = String::new();
    while let Some(item) = stream.next().await {
        match item? {
            bollard::container::LogOutput::StdOut { message } => {
                stdout.push_str(&String::from_utf8_lossy(&message));
            }
            bollard::container::LogOutput::StdErr { message } => {
                stderr.push_str(&String::from_utf8_lossy(&message));
            }
            _ => {}
        }
    }
    Ok((stdout, stderr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_types::state::ContainerRunBuilder;

    #[test]
    fn host_config_applies_resource_isolation_invariants() {
        let run = ContainerRunBuilder::new("alpine")
            .mount(std::path::PathBuf::from("/tmp/repo"), "/workspace/repo")
            .build()
            .unwrap();
        let hc = host_config(&run);
        assert_eq!(hc.memory, Some(run.memory_bytes));
        assert_eq!(hc.nano_cpus, Some(run.nano_cpus));
        assert_eq!(hc.readonly_rootfs, Some(true));
        assert_eq!(hc.network_mode.as_deref(), Some("none"));
        assert_eq!(hc.security_opt, Some(vec!["no-new-privileges".to_string()]));
        assert_eq!(hc.auto_remove, Some(true));
        assert_eq!(hc.binds, Some(vec!["/tmp/repo:/workspace/repo".to_string()]));
    }

    #[test]
    fn container_config_carries_ci_env_and_command() {
        let run = ContainerRunBuilder::new("alpine")
            .command(vec!["pytest".into(), "-q".into()])
            .build()
            .unwrap();
        let cfg = container_config(&run);
        assert_eq!(cfg.image, Some("alpine".to_string()));
        assert_eq!(cfg.cmd, Some(vec!["pytest".to_string(), "-q".to_string()]));
        assert!(cfg.env.unwrap().iter().any(|e| e == "CI=true"));
    }
}
