//! `GatewayError`: the webhook-boundary error type (spec §4.3 error
//! taxonomy, §7), following the teacher's `AppError` shape of mapping each
//! variant to an explicit status code and machine-readable code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use review_broker::errors::{BrokerError, IdempotencyError};

use crate::core::http::response_envelope;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid or missing API key")]
    Unauthorized,
    #[error("webhook endpoint disabled")]
    Forbidden,
    #[error("idempotency store error: {0}")]
    Idempotency(#[from] IdempotencyError),
    #[error("stream broker error: {0}")]
    Broker(#[from] BrokerError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Validation(msg) => {
                response_envelope::error(StatusCode::BAD_REQUEST, "validation_error", msg)
            }
            GatewayError::Unauthorized => {
                response_envelope::error(StatusCode::UNAUTHORIZED, "unauthorized", self.to_string())
            }
            GatewayError::Forbidden => {
                response_envelope::error(StatusCode::FORBIDDEN, "forbidden", self.to_string())
            }
            GatewayError::Idempotency(_) => {
                response_envelope::error(StatusCode::SERVICE_UNAVAILABLE, "idempotency_unavailable", self.to_string())
            }
            GatewayError::Broker(_) => {
                response_envelope::error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", self.to_string())
            }
        }
    }
}
