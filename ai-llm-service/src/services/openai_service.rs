//! OpenAI (chat completions) client: generate, embeddings, and streamed
//! generation over server-sent events (spec §4.7).
//!
//! Endpoints are derived from `LlmModelConfig::endpoint`:
//! - POST {endpoint}/v1/chat/completions — chat completion (streaming or not)
//! - POST {endpoint}/v1/embeddings       — embeddings retrieval

use std::pin::Pin;
use std::time::{Duration, Instant};

use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::llm_model_config::LlmModelConfig;
use crate::error_handler::{make_snippet, AiLlmError, HttpError, Provider, ProviderErrorKind};

type Result<T> = std::result::Result<T, AiLlmError>;

#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: LlmModelConfig,
    url_chat: String,
    url_embeddings: String,
}

impl OpenAiService {
    pub fn new(cfg: LlmModelConfig) -> Result<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| err(ProviderErrorKind::MissingApiKey))?;

        let endpoint = cfg.endpoint.trim();
        if endpoint.is_empty() || !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(err(ProviderErrorKind::InvalidEndpoint(cfg.endpoint.clone())));
        }

        let timeout = cfg.timeout_secs.map(Duration::from_secs).unwrap_or_else(|| Duration::from_secs(60));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| err(ProviderErrorKind::Decode(format!("invalid API key header: {e}"))))?,
        );
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder().timeout(timeout).default_headers(headers).build()?;

        let base = endpoint.trim_end_matches('/').to_string();
        let url_chat = format!("{base}/v1/chat/completions");
        let url_embeddings = format!("{base}/v1/embeddings");

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            timeout_secs = cfg.timeout_secs.unwrap_or(60),
            "OpenAiService initialized"
        );

        Ok(Self { client, cfg, url_chat, url_embeddings })
    }

    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String> {
        let started = Instant::now();
        let body = ChatCompletionRequest::from_cfg(&self.cfg, prompt, system, false);

        debug!(model = %self.cfg.model, prompt_len = prompt.len(), "POST {}", self.url_chat);

        let resp = self.client.post(&self.url_chat).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(self.http_status_error(&self.url_chat, resp, started).await);
        }

        let out: ChatCompletionResponse = resp.json().await.map_err(|e| {
            err(ProviderErrorKind::Decode(format!("serde error: {e}; expected `choices[0].message.content`")))
        })?;

        let content = out
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| err(ProviderErrorKind::EmptyChoices))?;

        info!(model = %self.cfg.model, latency_ms = started.elapsed().as_millis(), "chat completion completed");
        Ok(content)
    }

    /// Streamed chat completion, yielding content deltas as they arrive over SSE.
    pub fn stream_completion<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
    ) -> Pin<Box<dyn Stream<Item = Result<String>> + Send + 'a>> {
        let body = ChatCompletionRequest::from_cfg(&self.cfg, prompt, system, true);
        let client = self.client.clone();
        let url = self.url_chat.clone();
        let model = self.cfg.model.clone();

        let out = stream! {
            let started = Instant::now();
            let resp = match client
                .post(&url)
                .header(header::ACCEPT, "text/event-stream")
                .json(&body)
                .send()
                .await
            {
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
                error!(provider = "openai", %status, %snippet, model = %model, "stream POST returned non-success status");
                yield Err(err(ProviderErrorKind::HttpStatus(HttpError { status, url: url.clone(), snippet })));
                return;
            }

            let mut events = resp.bytes_stream().eventsource();

            while let Some(event) = events.next().await {
                let event = match event {
                    Ok(e) => e,
                    Err(e) => {
                        yield Err(AiLlmError::Stream(format!("SSE transport error: {e}")));
                        return;
                    }
                };

                if event.data == "[DONE]" {
                    debug!(model = %model, latency_ms = started.elapsed().as_millis(), "openai stream completed");
                    return;
                }

                match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                    Ok(parsed) => {
                        if let Some(choice) = parsed.choices.into_iter().next() {
                            if let Some(content) = choice.delta.content {
                                if !content.is_empty() {
                                    yield Ok(content);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(AiLlmError::Stream(format!("malformed SSE event: {e}")));
                        return;
                    }
                }
            }
        };

        Box::pin(out)
    }

    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>> {
        let started = Instant::now();
        let body = EmbeddingsRequest { model: &self.cfg.model, input };

        debug!(model = %self.cfg.model, input_len = input.len(), "POST {}", self.url_embeddings);

        let resp = self.client.post(&self.url_embeddings).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(self.http_status_error(&self.url_embeddings, resp, started).await);
        }

        let out: EmbeddingsResponse = resp.json().await.map_err(|e| {
            err(ProviderErrorKind::Decode(format!("serde error: {e}; expected `data[0].embedding`")))
        })?;

        let first = out
            .data
            .into_iter()
            .next()
            .ok_or_else(|| err(ProviderErrorKind::Decode("empty `data` in embeddings response".into())))?;

        info!(model = %self.cfg.model, latency_ms = started.elapsed().as_millis(), "embeddings completed");
        Ok(first.embedding)
    }

    async fn http_status_error(&self, url: &str, resp: reqwest::Response, started: Instant) -> AiLlmError {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let snippet = make_snippet(&text);
        error!(
            provider = "openai",
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
    AiLlmError::Provider(crate::error_handler::ProviderError::new(Provider::OpenAI, kind))
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn from_cfg(cfg: &'a LlmModelConfig, prompt: &'a str, system: Option<&'a str>, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(ChatMessage { role: "system", content: Some(sys) });
        }
        messages.push(ChatMessage { role: "user", content: Some(prompt) });

        Self {
            model: &cfg.model,
            messages,
            stream,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    choices: Vec<ChatChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChunkChoice {
    delta: ChatChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChatChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
}
