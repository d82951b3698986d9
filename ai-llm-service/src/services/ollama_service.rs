//! Ollama client: generate, embeddings, and streamed generation (spec §4.7).
//!
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/api/generate   — single-shot or streamed completion
//! - POST {endpoint}/api/embeddings — embeddings retrieval
//!
//! Streaming responses are newline-delimited JSON objects
//! (`{"response": "...", "done": false}`, ..., `{"done": true}`), not SSE.

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_stream::stream;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::llm_model_config::LlmModelConfig;
use crate::error_handler::{make_snippet, AiLlmError, HttpError, Provider, ProviderErrorKind};

type Result<T> = std::result::Result<T, AiLlmError>;

/// Thin client for a local Ollama runtime.
#[derive(Debug)]
pub struct OllamaService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_generate: String,
    url_embeddings: String,
}

impl OllamaService {
    pub fn new(cfg: LlmModelConfig) -> Result<Self> {
        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty() || !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(err(ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone())));
        }

        let timeout = cfg.timeout_secs.map(Duration::from_secs).unwrap_or_else(|| Duration::from_secs(60));
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_generate = format!("{base}/api/generate");
        let url_embeddings = format!("{base}/api/embeddings");

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = cfg.timeout_secs.unwrap_or(60),
            "OllamaService initialized"
        );

        Ok(Self { client, cfg, url_generate, url_embeddings })
    }

    /// Single-shot, non-streaming generation.
    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let started = Instant::now();
        let body = GenerateRequest::from_cfg(&self.cfg, prompt, system, false);

        debug!(model = %self.cfg.model, prompt_len = prompt.len(), "POST {}", self.url_generate);

        let resp = self.client.post(&self.url_generate).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(self.http_status_error(&self.url_generate, resp, started).await);
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| {
            err(ProviderErrorKind::Decode(format!("serde error: {e}; expected `response`")))
        })?;

        info!(model = %self.cfg.model, latency_ms = started.elapsed().as_millis(), "generation completed");
        Ok(out.response)
    }

    /// Streamed generation yielding content deltas in arrival order (spec §4.7).
    ///
    /// Suspends between deltas; the caller is responsible for an absolute
    /// timeout wrapping consumption of the whole stream.
    pub fn stream_completion<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
    ) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>> {
        let body = GenerateRequest::from_cfg(&self.cfg, prompt, system, true);
        let client = self.client.clone();
        let url = self.url_generate.clone();
        let model = self.cfg.model.clone();

        let out = stream! {
            let started = Instant::now();
            let resp = match client.post(&url).json(&body).send().await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(AiLlmError::from(e));
                    return;
                }
            };

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                let snippet = make_snippet(&text);
                error!(provider = "ollama", %status, %snippet, model = %model, "stream POST returned non-success status");
                yield Err(err(ProviderErrorKind::HttpStatus(HttpError { status, url: url.clone(), snippet })));
                return;
            }

            let mut byte_stream = resp.bytes_stream();
            let mut carry = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(AiLlmError::Stream(format!("transport error: {e}")));
                        return;
                    }
                };
                carry.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = carry.find('\n') {
                    let line = carry[..pos].trim().to_string();
                    carry.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<GenerateStreamLine>(&line) {
                        Ok(parsed) => {
                            if !parsed.response.is_empty() {
                                yield Ok(parsed.response);
                            }
                            if parsed.done {
                                debug!(model = %model, latency_ms = started.elapsed().as_millis(), "ollama stream completed");
                                return;
                            }
                        }
                        Err(e) => {
                            yield Err(AiLlmError::Stream(format!("malformed stream line: {e}")));
                            return;
                        }
                    }
                }
            }
        };

        Box::pin(out)
    }

    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>> {
        let started = Instant::now();
        let body = EmbeddingsRequest { model: &self.cfg.model, prompt: input };

        debug!(model = %self.cfg.model, input_len = input.len(), "POST {}", self.url_embeddings);

        let resp = self.client.post(&self.url_embeddings).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(self.http_status_error(&self.url_embeddings, resp, started).await);
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            err(ProviderErrorKind::Decode(format!("serde error: {e}; expected `embedding`")))
        })?;

        info!(model = %self.cfg.model, latency_ms = started.elapsed().as_millis(), "embeddings completed");
        Ok(out.embedding)
    }

    async fn http_status_error(&self, url: &str, resp: reqwest::Response, started: Instant) -> AiLlmError {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let snippet = make_snippet(&text);
        error!(
            provider = "ollama",
            %status,
            %snippet,
            model = %self.cfg.model,
            latency_ms = started.elapsed().as_millis(),
            "request returned non-success status"
        );
        err(ProviderErrorKind::HttpStatus(HttpError { status, url: url.to_string(), snippet }))
    }
}

fn err(kind: ProviderErrorKind) -> AiLlmError {
    AiLlmError::Provider(crate::error_handler::ProviderError::new(Provider::Ollama, kind))
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

impl<'a> GenerateRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, prompt: &'a str, system: Option<&'a str>, stream: bool) -> Self {
        Self {
            model: &cfg.model,
            prompt,
            system,
            stream,
            options: GenerateOptions {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                num_predict: cfg.max_tokens.map(|t| t as i64),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct GenerateStreamLine {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}
