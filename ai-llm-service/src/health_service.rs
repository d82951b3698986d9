//! Lightweight health probe for the configured LLM backend.
//!
//! - Ollama: `GET {endpoint}/api/tags` (best-effort model existence check)
//! - OpenAI: `GET {endpoint}/v1/models` with Bearer auth (best-effort model existence check)
//!
//! [`HealthService::check`] is resilient and never fails: any failure maps to
//! `HealthStatus { ok: false, .. }`, which is convenient for a `/health` route.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::llm_model_config::LlmModelConfig;
use crate::config::llm_provider::LlmProvider;
use crate::error_handler::{make_snippet, AiLlmError, HealthError, HttpError};

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub provider: String,
    pub endpoint: String,
    pub model: String,
    pub ok: bool,
    pub latency_ms: u128,
    pub message: String,
}

impl HealthStatus {
    fn ok(cfg: &LlmModelConfig, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.provider.as_str().to_string(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            ok: true,
            latency_ms,
            message: message.into(),
        }
    }

    fn fail(cfg: &LlmModelConfig, latency_ms: u128, message: impl Into<String>) -> Self {
        Self {
            provider: cfg.provider.as_str().to_string(),
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            ok: false,
            latency_ms,
            message: message.into(),
        }
    }
}

pub struct HealthService {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HealthService {
    pub fn new(timeout_secs: Option<u64>) -> Result<Self, AiLlmError> {
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(10));
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, default_timeout: timeout })
    }

    pub async fn check(&self, cfg: &LlmModelConfig) -> HealthStatus {
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty() || !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            warn!(provider = %cfg.provider, endpoint = %cfg.endpoint, "invalid endpoint (empty or missing http/https)");
            return HealthStatus::fail(cfg, 0, "endpoint is empty or missing http/https");
        }

        let start = Instant::now();
        let result = match cfg.provider {
            LlmProvider::Ollama => self.probe_ollama(cfg).await,
            LlmProvider::OpenAI => self.probe_openai(cfg).await,
        };

        match result {
            Ok(mut status) => {
                if status.latency_ms == 0 {
                    status.latency_ms = start.elapsed().as_millis();
                }
                status
            }
            Err(e) => {
                let status = HealthStatus::fail(cfg, start.elapsed().as_millis(), e.to_string());
                warn!(provider = %cfg.provider, message = %status.message, "health probe failed");
                status
            }
        }
    }

    async fn probe_ollama(&self, cfg: &LlmModelConfig) -> Result<HealthStatus, AiLlmError> {
        let url = format!("{}/api/tags", cfg.endpoint.trim_end_matches('/'));
        let timeout = cfg.timeout_secs.map(Duration::from_secs).unwrap_or(self.default_timeout);

        let start = Instant::now();
        debug!(provider = "ollama", "GET {}", url);

        let resp = self.client.get(&url).timeout(timeout).send().await?;
        let latency = start.elapsed().as_millis();

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(provider = "ollama", %status, %snippet, "health GET /api/tags returned non-success status");
            return Err(HealthError::HttpStatus(HttpError { status, url, snippet }).into());
        }

        #[derive(serde::Deserialize)]
        struct Tag {
            name: String,
        }
        #[derive(serde::Deserialize)]
        struct Tags {
            models: Option<Vec<Tag>>,
        }

        match resp.json::<Tags>().await {
            Ok(tags) => {
                let exists = tags.models.map(|m| m.iter().any(|t| t.name == cfg.model)).unwrap_or(true);
                if exists {
                    Ok(HealthStatus::ok(cfg, latency, "ollama is healthy; model is available"))
                } else {
                    Ok(HealthStatus::fail(cfg, latency, "ollama is up, but model not found in /api/tags"))
                }
            }
            Err(e) => Ok(HealthStatus::ok(cfg, latency, format!("ollama is reachable; failed to decode /api/tags: {e}"))),
        }
    }

    async fn probe_openai(&self, cfg: &LlmModelConfig) -> Result<HealthStatus, AiLlmError> {
        let base = cfg.endpoint.trim_end_matches('/').to_string();
        let url = format!("{base}/v1/models");
        let timeout = cfg.timeout_secs.map(Duration::from_secs).unwrap_or(self.default_timeout);

        let api_key = cfg
            .api_key
            .as_ref()
            .ok_or_else(|| AiLlmError::Health(HealthError::Decode("missing OpenAI API key".into())))?;
        let auth_header = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| AiLlmError::Health(HealthError::Decode(format!("invalid API key header: {e}"))))?;

        let start = Instant::now();
        debug!(provider = "openai", "GET {}", url);

        let resp = self.client.get(&url).timeout(timeout).header(header::AUTHORIZATION, auth_header).send().await?;
        let latency = start.elapsed().as_millis();

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            let snippet = make_snippet(&text);
            error!(provider = "openai", %status, %snippet, "health GET /v1/models returned non-success status");
            return Err(HealthError::HttpStatus(HttpError { status, url, snippet }).into());
        }

        #[derive(serde::Deserialize)]
        struct ModelItem {
            id: String,
        }
        #[derive(serde::Deserialize)]
        struct Models {
            data: Vec<ModelItem>,
        }

        match resp.json::<Models>().await {
            Ok(models) => {
                let exists = models.data.iter().any(|m| m.id == cfg.model);
                if exists {
                    Ok(HealthStatus::ok(cfg, latency, "openai is healthy; model is available"))
                } else {
                    Ok(HealthStatus::fail(cfg, latency, "openai is up, but model not found in /v1/models"))
                }
            }
            Err(e) => Ok(HealthStatus::ok(cfg, latency, format!("openai is reachable; failed to decode /v1/models: {e}"))),
        }
    }
}
