//! Shared state for the gateway's handlers, adapted from the teacher's
//! `AppState` (base API/token/secret fields) generalized to the pipeline's
//! multi-provider, multi-key configuration.

use std::collections::HashMap;
use std::time::Duration;

use review_broker::BrokerClient;
use review_providers::ScmCredentials;
use review_types::{Provider, ReviewMode};

#[derive(Clone)]
pub struct AppState {
    pub broker: BrokerClient,
    /// Constant-time-compared allowed set for the `X-API-Key` header.
    pub api_keys: Vec<String>,
    /// `false` rejects every request with 403 regardless of API key (spec
    /// §4.3 step 1, §8 boundary: "API key matching but endpoint disabled").
    pub webhook_enabled: bool,
    pub idempotency_ttl: Duration,
    pub default_review_mode: ReviewMode,
    pub scm_credentials: HashMap<Provider, ScmCredentials>,
}
