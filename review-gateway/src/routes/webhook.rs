//! C3: Ingestion Gateway. `POST /webhooks` (spec §4.3, §6).

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use review_broker::{check_and_mark, ClaimOutcome};
use review_types::{AsyncReviewRequest, ChangeRequestIdentifier, Provider, RepositoryIdentifier, ReviewMode};
use serde::Deserialize;
use subtle::ConstantTimeEq;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::core::app_state::AppState;
use crate::core::http::response_envelope;
use crate::error::GatewayError;

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub provider: String,
    pub repository_id: String,
    pub change_request_id: i64,
    #[allow(dead_code)]
    pub trigger_source: Option<String>,
    #[serde(default)]
    pub review_mode: Option<String>,
}

/// Sanitizes CR/LF out of untrusted strings before they hit a log line
/// (spec §4.3 error taxonomy, §7: "logs must never include raw CR/LF").
fn sanitize_for_log(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// Compares `provided` against every key in `allowed` in constant time,
/// independent of which key (if any) matches or how many there are.
fn api_key_is_allowed(allowed: &[String], provided: &str) -> bool {
    let provided = provided.as_bytes();
    let mut ok = subtle::Choice::from(0u8);
    for key in allowed {
        let key = key.as_bytes();
        if key.len() == provided.len() {
            ok |= key.ct_eq(provided);
        }
    }
    ok.into()
}

#[instrument(skip(state, headers, body))]
pub async fn webhook_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<WebhookPayload>,
) -> Response {
    match handle(&state, &headers, body).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, body: WebhookPayload) -> Result<Response, GatewayError> {
    if !state.webhook_enabled {
        return Err(GatewayError::Forbidden);
    }

    let provided_key = headers
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if provided_key.is_empty() || !api_key_is_allowed(&state.api_keys, provided_key) {
        return Err(GatewayError::Unauthorized);
    }

    let provider = Provider::parse(&body.provider)
        .ok_or_else(|| GatewayError::Validation(format!("unknown provider: {}", sanitize_for_log(&body.provider))))?;

    if body.repository_id.trim().is_empty() {
        return Err(GatewayError::Validation("repositoryId must not be blank".into()));
    }
    let change_request_id = ChangeRequestIdentifier::new(body.change_request_id)
        .ok_or_else(|| GatewayError::Validation("changeRequestId must be a positive integer".into()))?;

    let review_mode = match body.review_mode.as_deref() {
        Some("DIFF") | Some("diff") => ReviewMode::Diff,
        Some("AGENTIC") | Some("agentic") => ReviewMode::Agentic,
        Some(other) => {
            return Err(GatewayError::Validation(format!("unknown reviewMode: {}", sanitize_for_log(other))))
        }
        None => state.default_review_mode,
    };

    let idempotency_key = headers
        .get("X-Idempotency-Key")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}:{}", body.repository_id, change_request_id.value()));

    let claim = check_and_mark(&state.broker, &idempotency_key, state.idempotency_ttl).await?;
    let request_id = Uuid::new_v4();
    if claim == ClaimOutcome::Replay {
        info!(idempotency_key = %idempotency_key, "webhook replay, already processed");
        return Ok(response_envelope::already_processed(request_id.to_string()));
    }

    let request = AsyncReviewRequest {
        request_id,
        provider,
        repository_id: RepositoryIdentifier::new(provider, body.repository_id.clone()),
        change_request_id,
        review_mode,
        created_at: Utc::now(),
    };

    let stream_key = review_worker::router::route(review_mode);
    let payload = serde_json::to_string(&request).map_err(|e| {
        warn!(error = %e, "failed to serialize AsyncReviewRequest");
        GatewayError::Validation("failed to serialize request".into())
    })?;

    state.broker.publish(stream_key, &request_id.to_string(), &payload).await?;

    info!(request_id = %request_id, stream = stream_key, "webhook accepted");
    Ok(response_envelope::accepted(request_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_allowed_matches_exact_key() {
        let allowed = vec!["key-a".to_string(), "key-b".to_string()];
        assert!(api_key_is_allowed(&allowed, "key-b"));
        assert!(!api_key_is_allowed(&allowed, "key-c"));
        assert!(!api_key_is_allowed(&allowed, ""));
    }

    #[test]
    fn sanitize_for_log_strips_crlf() {
        assert_eq!(sanitize_for_log("a\r\nb"), "a  b");
    }
}
