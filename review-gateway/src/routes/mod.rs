pub mod health;
pub mod webhook;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::limit::RequestBodyLimitLayer;

use crate::core::app_state::AppState;
use crate::middleware::correlation::correlation_id;

/// 1 MiB webhook body cap; providers never send a diff payload inline, only
/// identifiers.
const MAX_WEBHOOK_BODY_BYTES: usize = 1024 * 1024;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/webhooks", post(webhook::webhook_route))
        .route("/healthz", get(health::health_route))
        .layer(middleware::from_fn(correlation_id))
        .layer(RequestBodyLimitLayer::new(MAX_WEBHOOK_BODY_BYTES))
        .with_state(state)
}
