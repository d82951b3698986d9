//! Error types and validation helpers for `ai-llm-service`.
//!
//! All error messages include the prefix `[AI LLM Service]` so that logs and
//! bubbled-up errors can be easily attributed to this crate.

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Error enum for environment/config-driven setup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[AI LLM Service] missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("[AI LLM Service] invalid number in {var}: {reason}")]
    InvalidNumber { var: &'static str, reason: &'static str },

    #[error("[AI LLM Service] unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("[AI LLM Service] invalid format in {var}: {reason}")]
    InvalidFormat { var: &'static str, reason: &'static str },

    #[error("[AI LLM Service] {field} is out of range: {detail}")]
    OutOfRange { field: &'static str, detail: &'static str },
}

pub fn must_env(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

pub fn env_opt_u32(name: &'static str) -> Result<Option<u32>> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var: name, reason: "expected u32" }),
        _ => Ok(None),
    }
}

pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat { var, reason: "must start with http:// or https://" })
    }
}

pub fn validate_range_f32(field: &'static str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, detail: "expected value in inclusive range" })
    }
}

/// Identifies which backend a [`ProviderError`] came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Ollama,
    OpenAI,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => f.write_str("ollama"),
            Self::OpenAI => f.write_str("openai"),
        }
    }
}

/// Status, URL, and a truncated body snippet for a non-2xx HTTP response.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub url: String,
    pub snippet: String,
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} from {}: {}", self.status, self.url, self.snippet)
    }
}

#[derive(Debug, Error)]
pub enum ProviderErrorKind {
    #[error("provider mismatch: config does not target this client")]
    InvalidProvider,
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("non-success response: {0}")]
    HttpStatus(HttpError),
    #[error("failed to decode response: {0}")]
    Decode(String),
    #[error("response contained no choices/output")]
    EmptyChoices,
}

#[derive(Debug, Error)]
#[error("[{provider}] {kind}")]
pub struct ProviderError {
    pub provider: Provider,
    pub kind: ProviderErrorKind,
}

impl ProviderError {
    pub fn new(provider: Provider, kind: ProviderErrorKind) -> Self {
        Self { provider, kind }
    }
}

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("non-success response: {0}")]
    HttpStatus(HttpError),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Truncates a response body to a short snippet suitable for log lines.
pub fn make_snippet(body: &str) -> String {
    const MAX: usize = 300;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &body[..cut])
    }
}

#[derive(Debug, Error)]
pub enum AiLlmError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Health(#[from] HealthError),
    #[error("http transport error: {0}")]
    HttpTransport(#[from] reqwest::Error),
    #[error("LLM stream timed out after {0}s")]
    StreamTimeout(u64),
    #[error("LLM stream error: {0}")]
    Stream(String),
}
