use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    #[error("illegal FSM transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: review_types::state::ReviewStatus,
        to: review_types::state::ReviewStatus,
    },
    #[error("review state not found for request {0}")]
    NotFound(uuid::Uuid),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
