//! LLM client abstraction for C7: provider selection, streaming completion
//! with an absolute timeout, non-streaming generation, embeddings, health
//! checks, and prompt assembly.

pub mod config;
pub mod error_handler;
pub mod health_service;
pub mod prompt;
pub mod services;
pub mod telemetry;

use std::pin::Pin;
use std::time::Duration;

use futures::{Stream, StreamExt};

pub use config::llm_model_config::LlmModelConfig;
pub use config::llm_provider::LlmProvider;
pub use error_handler::AiLlmError;
pub use health_service::{HealthService, HealthStatus};

use services::ollama_service::OllamaService;
use services::openai_service::OpenAiService;

/// Default absolute timeout for a streamed completion (spec §4.7).
pub const DEFAULT_STREAM_TIMEOUT_SECS: u64 = 60;

/// Enum-dispatched LLM client, selected by `LlmModelConfig::provider`.
pub enum LlmPort {
    Ollama(OllamaService),
    OpenAi(OpenAiService),
}

impl LlmPort {
    pub fn new(cfg: LlmModelConfig) -> Result<Self, AiLlmError> {
        match cfg.provider {
            LlmProvider::Ollama => Ok(Self::Ollama(OllamaService::new(cfg)?)),
            LlmProvider::OpenAI => Ok(Self::OpenAi(OpenAiService::new(cfg)?)),
        }
    }

    pub async fn generate(&self, prompt: &str, system: Option<&str>) -> Result<String, AiLlmError> {
        match self {
            Self::Ollama(c) => c.generate(prompt, system).await,
            Self::OpenAi(c) => c.generate(prompt, system).await,
        }
    }

    pub async fn embeddings(&self, input: &str) -> Result<Vec<f32>, AiLlmError> {
        match self {
            Self::Ollama(c) => c.embeddings(input).await,
            Self::OpenAi(c) => c.embeddings(input).await,
        }
    }

    fn stream_completion<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
    ) -> Pin<Box<dyn Stream<Item = Result<String, AiLlmError>> + Send + 'a>> {
        match self {
            Self::Ollama(c) => c.stream_completion(prompt, system),
            Self::OpenAi(c) => c.stream_completion(prompt, system),
        }
    }

    /// Streamed completion bounded by an absolute timeout (spec §4.7, default
    /// 60s). On timeout the stream is cancelled and yields a terminal
    /// `AiLlmError::StreamTimeout`.
    pub fn stream_completion_with_timeout<'a>(
        &'a self,
        prompt: &'a str,
        system: Option<&'a str>,
        timeout: Duration,
    ) -> Pin<Box<dyn Stream<Item = Result<String, AiLlmError>> + Send + 'a>> {
        let inner = self.stream_completion(prompt, system);

        let out = async_stream::stream! {
            tokio::pin!(inner);
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                match tokio::time::timeout_at(deadline, inner.next()).await {
                    Ok(Some(item)) => yield item,
                    Ok(None) => return,
                    Err(_) => {
                        yield Err(AiLlmError::StreamTimeout(timeout.as_secs()));
                        return;
                    }
                }
            }
        };

        Box::pin(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ollama_config_with_invalid_endpoint_is_rejected() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::Ollama,
            model: "qwen3".into(),
            endpoint: "not-a-url".into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: None,
        };
        assert!(LlmPort::new(cfg).is_err());
    }

    #[test]
    fn openai_config_without_api_key_is_rejected() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".into(),
            endpoint: "https://api.openai.com".into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: None,
        };
        assert!(LlmPort::new(cfg).is_err());
    }

    #[test]
    fn openai_config_with_valid_inputs_constructs() {
        let cfg = LlmModelConfig {
            provider: LlmProvider::OpenAI,
            model: "gpt-4o-mini".into(),
            endpoint: "https://api.openai.com".into(),
            api_key: Some("sk-test".into()),
            max_tokens: Some(1024),
            temperature: Some(0.2),
            top_p: None,
            timeout_secs: Some(30),
        };
        assert!(LlmPort::new(cfg).is_ok());
    }
}
