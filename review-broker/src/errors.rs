//! Error types for the stream broker and idempotency keeper.

use thiserror::Error;

pub type BrokerResult<T> = Result<T, BrokerError>;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("BROKER_UNAVAILABLE: {0}")]
    Unavailable(String),
    #[error("broker redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to serialize stream payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("IDEMPOTENCY_UNAVAILABLE: {0}")]
    Unavailable(String),
    #[error("idempotency redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
