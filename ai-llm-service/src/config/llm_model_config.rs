use crate::config::llm_provider::LlmProvider;

/// Configuration for a single LLM model invocation (spec §4.7).
///
/// One `LlmModelConfig` drives one `LlmPort` instance. C7 needs exactly one
/// configured model per worker process, not a pool of profiles.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmModelConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_secs: Option<u64>,
}
