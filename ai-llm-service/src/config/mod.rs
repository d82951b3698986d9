pub mod llm_model_config;
pub mod llm_provider;

use crate::error_handler::{must_env, validate_http_endpoint, AiLlmError, ConfigError};
use llm_model_config::LlmModelConfig;
use llm_provider::LlmProvider;

/// Resolves the Ollama endpoint from environment.
///
/// Precedence: `OLLAMA_URL` if set and non-empty, else `OLLAMA_PORT` expanded
/// to `http://localhost:{port}`.
fn ollama_endpoint() -> Result<String, AiLlmError> {
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        if !url.trim().is_empty() {
            return Ok(url);
        }
    }
    if let Ok(port) = std::env::var("OLLAMA_PORT") {
        if !port.trim().is_empty() {
            port.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
                var: "OLLAMA_PORT",
                reason: "expected u16 (1..=65535)",
            })?;
            return Ok(format!("http://localhost:{port}"));
        }
    }
    Err(ConfigError::MissingVar("OLLAMA_URL or OLLAMA_PORT").into())
}

/// Builds the single configured [`LlmModelConfig`] for this worker process
/// from `LLM_KIND` and provider-specific environment variables.
///
/// # Env
/// - `LLM_KIND` = `ollama` | `openai` (required)
/// - `LLM_MODEL` (required)
/// - `LLM_MAX_TOKENS` (optional u32)
/// - `LLM_TIMEOUT_SECS` (optional u64, default 60 per spec §4.7's absolute timeout)
/// - Ollama: `OLLAMA_URL` or `OLLAMA_PORT`
/// - OpenAI: `OPENAI_API_KEY` (required), `OPENAI_BASE_URL` (default `https://api.openai.com`)
pub fn config_from_env() -> Result<LlmModelConfig, AiLlmError> {
    let kind = must_env("LLM_KIND")?;
    let provider = LlmProvider::parse(&kind).ok_or(ConfigError::UnsupportedProvider(kind))?;
    let model = must_env("LLM_MODEL")?;
    let max_tokens = crate::error_handler::env_opt_u32("LLM_MAX_TOKENS")?;
    let timeout_secs = crate::error_handler::env_opt_u32("LLM_TIMEOUT_SECS")?
        .map(u64::from)
        .or(Some(60));

    let (endpoint, api_key) = match provider {
        LlmProvider::Ollama => (ollama_endpoint()?, None),
        LlmProvider::OpenAI => {
            let endpoint = std::env::var("OPENAI_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "https://api.openai.com".to_string());
            validate_http_endpoint("OPENAI_BASE_URL", &endpoint)?;
            (endpoint, Some(must_env("OPENAI_API_KEY")?))
        }
    };

    Ok(LlmModelConfig {
        provider,
        model,
        endpoint,
        api_key,
        max_tokens,
        temperature: Some(0.2),
        top_p: None,
        timeout_secs,
    })
}
