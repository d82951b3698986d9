//! Environment-driven startup configuration, following
//! `ai_llm_service::error_handler`'s `must_env`/`env_opt_u32`/
//! `validate_http_endpoint` helper shape.

use std::collections::HashMap;
use std::time::Duration;

use ai_llm_service::config::llm_model_config::LlmModelConfig;
use ai_llm_service::error_handler::{env_opt_u32, must_env, validate_http_endpoint, ConfigError};
use anyhow::Context;
use review_providers::ScmCredentials;
use review_types::{Provider, ReviewMode};

pub struct Config {
    pub bind_addr: String,
    pub api_keys: Vec<String>,
    pub webhook_enabled: bool,
    pub idempotency_ttl: Duration,
    pub default_review_mode: ReviewMode,
    pub scm_credentials: HashMap<Provider, ScmCredentials>,
    pub redis_url: Option<String>,
    pub postgres_dsn: String,
    pub llm: LlmModelConfig,
    pub runner_image: String,
    pub sandbox_timeout: Duration,
    pub worker_count: usize,
    pub confidence_threshold: f32,
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    env_opt(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = env_opt("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let api_keys: Vec<String> = must_env("WEBHOOK_API_KEYS")?
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if api_keys.is_empty() {
            return Err(ConfigError::MissingVar("WEBHOOK_API_KEYS").into());
        }

        let webhook_enabled = env_bool("WEBHOOK_ENABLED", true);

        let idempotency_ttl_secs = env_opt_u32("IDEMPOTENCY_TTL_SECS")?.unwrap_or(3600);
        let idempotency_ttl = Duration::from_secs(idempotency_ttl_secs as u64);

        let default_review_mode = match env_opt("DEFAULT_REVIEW_MODE").as_deref() {
            Some("AGENTIC") | Some("agentic") => ReviewMode::Agentic,
            _ => ReviewMode::Diff,
        };

        let mut scm_credentials = HashMap::new();
        if let (Some(base_api), Some(token)) = (env_opt("GITHUB_API_BASE"), env_opt("GITHUB_TOKEN")) {
            validate_http_endpoint("GITHUB_API_BASE", &base_api)?;
            scm_credentials.insert(Provider::Github, ScmCredentials { base_api, token });
        }
        if let (Some(base_api), Some(token)) = (env_opt("GITLAB_API_BASE"), env_opt("GITLAB_TOKEN")) {
            validate_http_endpoint("GITLAB_API_BASE", &base_api)?;
            scm_credentials.insert(Provider::Gitlab, ScmCredentials { base_api, token });
        }
        if scm_credentials.is_empty() {
            return Err(ConfigError::MissingVar("GITHUB_TOKEN or GITLAB_TOKEN").into());
        }

        let redis_url = env_opt("REDIS_URL");
        let postgres_dsn = must_env("DATABASE_URL")?;

        let llm = ai_llm_service::config::config_from_env().context("failed to load LLM configuration")?;

        let runner_image = env_opt("SANDBOX_RUNNER_IMAGE").unwrap_or_else(|| "review-sandbox-runner:latest".to_string());
        let sandbox_timeout = Duration::from_secs(env_opt_u32("SANDBOX_TIMEOUT_SECS")?.unwrap_or(120) as u64);

        let worker_count = env_opt_u32("WORKER_COUNT")?.unwrap_or(4) as usize;
        let confidence_threshold = env_opt("CONFIDENCE_THRESHOLD")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.5);

        Ok(Self {
            bind_addr,
            api_keys,
            webhook_enabled,
            idempotency_ttl,
            default_review_mode,
            scm_credentials,
            redis_url,
            postgres_dsn,
            llm,
            runner_image,
            sandbox_timeout,
            worker_count,
            confidence_threshold,
        })
    }
}
