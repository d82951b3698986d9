//! `OrchestratorError`: the layered top-level failure type for C5's
//! orchestration glue, composing every sub-domain's error via `#[from]`
//! (spec §7 error table), following `mr-reviewer::errors::Error`'s
//! wrap-everything-with-thiserror layering.

use review_broker::errors::BrokerError;
use review_core::AccumulatorError;
use review_providers::ScmError;
use review_sandbox::SandboxError;
use review_store::StoreError;
use review_types::Provider;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("stream broker error: {0}")]
    Broker(#[from] BrokerError),
    #[error("scm error: {0}")]
    Scm(#[from] ScmError),
    #[error("llm error: {0}")]
    Llm(#[from] ai_llm_service::AiLlmError),
    #[error("LLM_SCHEMA_VIOLATION: {0}")]
    SchemaViolation(#[from] AccumulatorError),
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),
    #[error("review state store error: {0}")]
    Store(#[from] StoreError),
    #[error("malformed stream record payload: {0}")]
    PayloadParse(#[from] serde_json::Error),
    #[error("no SCM credentials configured for provider {0:?}")]
    MissingCredentials(Provider),
    #[error("AGENTIC mode requested but no docker client is configured for this worker")]
    SandboxUnavailable,
}
