//! C11: Review State Store.
//!
//! Relational store keyed by `(repositoryId, changeRequestId, provider)`.
//! FSM transitions are single-transaction operations; `save` resolves
//! concurrent writers on the same key by deleting-then-reinserting inside one
//! transaction while preserving `createdAt` (spec §5).

pub mod error;

use std::time::Duration;

use chrono::{DateTime, Utc};
use review_types::state::{ReviewState, ReviewStatus};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub use error::{StoreError, StoreResult};

const CREATE_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS review_state (
    request_id        UUID PRIMARY KEY,
    repository_id     TEXT NOT NULL,
    change_request_id BIGINT NOT NULL,
    provider          TEXT NOT NULL,
    status            TEXT NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL,
    completed_at      TIMESTAMPTZ,
    issues_json       JSONB,
    notes_json        JSONB,
    error             TEXT,
    UNIQUE (repository_id, change_request_id, provider)
)
"#;

pub struct ReviewStateStore {
    client: Client,
}

impl ReviewStateStore {
    /// Connects and spawns the connection driver task, following
    /// `tokio_postgres`'s split-client-and-connection convention.
    pub async fn connect(config: &str) -> StoreResult<Self> {
        let (client, connection) = tokio_postgres::connect(config, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection closed with error");
            }
        });
        client.batch_execute(CREATE_TABLE_SQL).await?;
        Ok(Self { client })
    }

    /// Inserts at `PENDING` if absent; if present, replaces issues/notes but
    /// preserves `created_at` (spec §4.11 `save`).
    #[instrument(skip(self, issues_json, notes_json))]
    pub async fn save(
        &mut self,
        request_id: Uuid,
        repository_id: &str,
        change_request_id: i64,
        provider: &str,
        issues_json: Option<serde_json::Value>,
        notes_json: Option<serde_json::Value>,
    ) -> StoreResult<()> {
        let tx = self.client.transaction().await?;

        let existing_created_at: Option<DateTime<Utc>> = tx
            .query_opt(
                "SELECT created_at FROM review_state WHERE repository_id = $1 AND change_request_id = $2 AND provider = $3 FOR UPDATE",
                &[&repository_id, &change_request_id, &provider],
            )
            .await?
            .map(|row| row.get(0));

        let created_at = existing_created_at.unwrap_or_else(Utc::now);

        tx.execute(
            "DELETE FROM review_state WHERE repository_id = $1 AND change_request_id = $2 AND provider = $3",
            &[&repository_id, &change_request_id, &provider],
        )
        .await?;

        tx.execute(
            "INSERT INTO review_state (request_id, repository_id, change_request_id, provider, status, created_at, completed_at, issues_json, notes_json, error)
             VALUES ($1, $2, $3, $4, $5, $6, NULL, $7, $8, NULL)",
            &[
                &request_id,
                &repository_id,
                &change_request_id,
                &provider,
                &"PENDING",
                &created_at,
                &issues_json,
                &notes_json,
            ],
        )
        .await?;

        tx.commit().await?;
        debug!(%request_id, "review state saved at PENDING");
        Ok(())
    }

    /// Requires the existing status be a legal predecessor of `next`;
    /// terminal states also set `completed_at` (spec §4.11 `updateState`, §8
    /// invariant 5).
    #[instrument(skip(self))]
    pub async fn update_state(&mut self, request_id: Uuid, next: ReviewStatus) -> StoreResult<()> {
        let tx = self.client.transaction().await?;

        let row = tx
            .query_opt(
                "SELECT status FROM review_state WHERE request_id = $1 FOR UPDATE",
                &[&request_id],
            )
            .await?
            .ok_or(StoreError::NotFound(request_id))?;
        let current: String = row.get(0);
        let current = parse_status(&current);

        if !current.can_transition_to(next) {
            return Err(StoreError::IllegalTransition { from: current, to: next });
        }

        if next.is_terminal() {
            tx.execute(
                "UPDATE review_state SET status = $1, completed_at = now() WHERE request_id = $2",
                &[&status_str(next), &request_id],
            )
            .await?;
        } else {
            tx.execute(
                "UPDATE review_state SET status = $1 WHERE request_id = $2",
                &[&status_str(next), &request_id],
            )
            .await?;
        }

        tx.commit().await?;
        info!(%request_id, from = ?current, to = ?next, "review state transitioned");
        Ok(())
    }

    /// Single-transaction combination of a result write and a state
    /// transition (spec §4.11 `updateResultAndState`).
    #[instrument(skip(self, issues_json, notes_json))]
    pub async fn update_result_and_state(
        &mut self,
        request_id: Uuid,
        issues_json: Option<serde_json::Value>,
        notes_json: Option<serde_json::Value>,
        error: Option<&str>,
        next: ReviewStatus,
    ) -> StoreResult<()> {
        let tx = self.client.transaction().await?;

        let row = tx
            .query_opt(
                "SELECT status FROM review_state WHERE request_id = $1 FOR UPDATE",
                &[&request_id],
            )
            .await?
            .ok_or(StoreError::NotFound(request_id))?;
        let current: String = row.get(0);
        let current = parse_status(&current);
        if !current.can_transition_to(next) {
            return Err(StoreError::IllegalTransition { from: current, to: next });
        }

        let completed_at = if next.is_terminal() { Some(Utc::now()) } else { None };

        tx.execute(
            "UPDATE review_state SET status = $1, issues_json = $2, notes_json = $3, error = $4, completed_at = COALESCE($5, completed_at) WHERE request_id = $6",
            &[&status_str(next), &issues_json, &notes_json, &error, &completed_at, &request_id],
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn find(&self, request_id: Uuid) -> StoreResult<Option<ReviewState>> {
        let row = self
            .client
            .query_opt(
                "SELECT repository_id, change_request_id, provider, request_id, status, created_at, completed_at, issues_json, notes_json, error
                 FROM review_state WHERE request_id = $1",
                &[&request_id],
            )
            .await?;
        Ok(row.map(row_to_state))
    }

    pub async fn find_by_key(
        &self,
        repository_id: &str,
        change_request_id: i64,
        provider: &str,
    ) -> StoreResult<Option<ReviewState>> {
        let row = self
            .client
            .query_opt(
                "SELECT repository_id, change_request_id, provider, request_id, status, created_at, completed_at, issues_json, notes_json, error
                 FROM review_state WHERE repository_id = $1 AND change_request_id = $2 AND provider = $3",
                &[&repository_id, &change_request_id, &provider],
            )
            .await?;
        Ok(row.map(row_to_state))
    }

    /// Deletes rows older than `retention` measured from `created_at`.
    #[instrument(skip(self))]
    pub async fn retention_sweep(&self, retention: Duration) -> StoreResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::from_std(retention).unwrap_or_default();
        let deleted = self
            .client
            .execute("DELETE FROM review_state WHERE created_at < $1", &[&cutoff])
            .await?;
        if deleted > 0 {
            info!(deleted, "retention sweep removed expired review state rows");
        }
        Ok(deleted)
    }
}

fn status_str(status: ReviewStatus) -> &'static str {
    match status {
        ReviewStatus::Pending => "PENDING",
        ReviewStatus::Processing => "PROCESSING",
        ReviewStatus::Completed => "COMPLETED",
        ReviewStatus::Failed => "FAILED",
    }
}

fn parse_status(s: &str) -> ReviewStatus {
    match s {
        "PENDING" => ReviewStatus::Pending,
        "PROCESSING" => ReviewStatus::Processing,
        "COMPLETED" => ReviewStatus::Completed,
        "FAILED" => ReviewStatus::Failed,
        other => unreachable!("unknown status persisted: {other}"),
    }
}

fn row_to_state(row: tokio_postgres::Row) -> ReviewState {
    let status: String = row.get("status");
    ReviewState {
        repository_id: row.get("repository_id"),
        change_request_id: row.get::<_, i64>("change_request_id") as u64,
        provider: row.get("provider"),
        request_id: row.get("request_id"),
        status: parse_status(&status),
        created_at: row.get("created_at"),
        completed_at: row.get("completed_at"),
        issues_json: row.get("issues_json"),
        notes_json: row.get("notes_json"),
        error: row.get("error"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_string_form() {
        for s in [
            ReviewStatus::Pending,
            ReviewStatus::Processing,
            ReviewStatus::Completed,
            ReviewStatus::Failed,
        ] {
            assert_eq!(parse_status(status_str(s)), s);
        }
    }
}
