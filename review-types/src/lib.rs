//! Shared data model for the review pipeline.
//!
//! These types cross crate boundaries (gateway, broker, worker, core) and are
//! serialized to JSON on the wire (stream records, result hashes) and to
//! Postgres rows (review state), so every type here derives `Serialize` +
//! `Deserialize` and avoids borrowed fields.

pub mod diff;
pub mod review;
pub mod state;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A source-control provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Gitlab,
}

impl Provider {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "github" => Some(Self::Github),
            "gitlab" => Some(Self::Gitlab),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Gitlab => "gitlab",
        }
    }
}

/// Discriminated repository identifier. `provider` and `opaque_id` are
/// immutable once constructed; equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryIdentifier {
    pub provider: Provider,
    pub opaque_id: String,
}

impl RepositoryIdentifier {
    pub fn new(provider: Provider, opaque_id: impl Into<String>) -> Self {
        Self {
            provider,
            opaque_id: opaque_id.into(),
        }
    }
}

/// A change request number, local to its provider. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRequestIdentifier(u64);

impl ChangeRequestIdentifier {
    /// Returns `None` for zero or values that do not fit a positive integer.
    pub fn new(value: i64) -> Option<Self> {
        if value > 0 {
            Some(Self(value as u64))
        } else {
            None
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// `DIFF` (LLM-only) or `AGENTIC` (containerized tool runs plus LLM synthesis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReviewMode {
    Diff,
    Agentic,
}

impl Default for ReviewMode {
    fn default() -> Self {
        Self::Diff
    }
}

/// Immutable once enqueued. `request_id` is the end-to-end correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncReviewRequest {
    pub request_id: Uuid,
    pub provider: Provider,
    pub repository_id: RepositoryIdentifier,
    pub change_request_id: ChangeRequestIdentifier,
    #[serde(default)]
    pub review_mode: ReviewMode,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A single stream record: `fields` carries `requestId` and a JSON `payload`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    pub record_id: String,
    pub request_id: String,
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_request_identifier_rejects_non_positive() {
        assert!(ChangeRequestIdentifier::new(0).is_none());
        assert!(ChangeRequestIdentifier::new(-1).is_none());
        assert_eq!(ChangeRequestIdentifier::new(42).unwrap().value(), 42);
    }

    #[test]
    fn async_review_request_round_trips() {
        let req = AsyncReviewRequest {
            request_id: Uuid::new_v4(),
            provider: Provider::Github,
            repository_id: RepositoryIdentifier::new(Provider::Github, "owner/repo"),
            change_request_id: ChangeRequestIdentifier::new(42).unwrap(),
            review_mode: ReviewMode::Diff,
            created_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: AsyncReviewRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(req, back);
    }

    #[test]
    fn review_mode_defaults_to_diff() {
        let json = r#"{"request_id":"00000000-0000-0000-0000-000000000000","provider":"github","repository_id":{"provider":"github","opaque_id":"a/b"},"change_request_id":1,"created_at":"2024-01-01T00:00:00Z"}"#;
        let req: AsyncReviewRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.review_mode, ReviewMode::Diff);
    }
}
