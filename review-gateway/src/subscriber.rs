//! C8's result subscriber: pattern-subscribes to `review:status:*`, reads
//! the completed result hash, and publishes comments back to the provider.
//! Retries on transient failure with bounded exponential backoff and never
//! acknowledges (advances past the event) until the publish is accepted
//! (spec §4.8).

use std::collections::HashMap;
use std::time::Duration;

use review_broker::{status_pattern, BrokerClient};
use review_providers::ScmPort;
use review_types::review::ReviewResult;
use review_types::{ChangeRequestIdentifier, Provider};
use tracing::{error, info, warn};

use crate::core::app_state::AppState;

const MAX_RETRIES: u32 = 5;
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub async fn run(state: std::sync::Arc<AppState>) {
    loop {
        match state.broker.subscribe_status_pattern(status_pattern()).await {
            Ok(mut subscription) => {
                info!("result subscriber listening on {}", status_pattern());
                while let Some((channel, payload)) = subscription.recv().await {
                    if payload != "COMPLETED" {
                        continue;
                    }
                    let Some(request_id) = channel.rsplit(':').next() else { continue };
                    if let Err(e) = handle_completed(&state.broker, &state, request_id).await {
                        error!(request_id, error = %e, "failed to publish comments after retries");
                    }
                }
                warn!("result subscription stream ended, reconnecting");
            }
            Err(e) => {
                warn!(error = %e, "failed to subscribe to status pattern, retrying");
                tokio::time::sleep(BASE_BACKOFF).await;
            }
        }
    }
}

async fn handle_completed(broker: &BrokerClient, state: &AppState, request_id: &str) -> Result<(), String> {
    let hash = broker
        .get_hash(&review_broker::result_hash_key(request_id))
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "result hash missing".to_string())?;

    let (provider, repository_id, change_request_id, result) = parse_hash(&hash)?;

    let Some(credentials) = state.scm_credentials.get(&provider) else {
        return Err(format!("no SCM credentials configured for provider {provider:?}"));
    };
    let scm = ScmPort::new(provider, credentials.clone()).map_err(|e| e.to_string())?;

    let mut attempt = 0u32;
    loop {
        match scm.publish_comments(&repository_id, change_request_id, &result).await {
            Ok(()) => {
                info!(request_id, "comments published");
                return Ok(());
            }
            Err(e) if attempt < MAX_RETRIES => {
                attempt += 1;
                let backoff = (BASE_BACKOFF * 2u32.pow(attempt)).min(MAX_BACKOFF);
                warn!(request_id, attempt, error = %e, "transient publish failure, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(e.to_string()),
        }
    }
}

fn parse_hash(hash: &HashMap<String, String>) -> Result<(Provider, String, ChangeRequestIdentifier, ReviewResult), String> {
    let provider = hash
        .get("provider")
        .and_then(|p| Provider::parse(p))
        .ok_or_else(|| "missing or unknown provider field".to_string())?;
    let repository_id = hash.get("repositoryId").cloned().ok_or_else(|| "missing repositoryId field".to_string())?;
    let change_request_id = hash
        .get("changeRequestId")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(ChangeRequestIdentifier::new)
        .ok_or_else(|| "missing or invalid changeRequestId field".to_string())?;
    let result: ReviewResult = hash
        .get("result")
        .ok_or_else(|| "missing result field".to_string())
        .and_then(|raw| serde_json::from_str(raw).map_err(|e| e.to_string()))?;

    Ok((provider, repository_id, change_request_id, result))
}
