use crate::database::error::DatabaseError;
use crate::error::AppResult;
use crate::reconcile::traits::EventLog;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Append-only webhook delivery log backed by `webhook_events`.
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLog for PgEventLog {
    async fn record(
        &self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
    ) -> AppResult<String> {
        let event_id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO webhook_events (id, event_type, source, payload, processed, attempts, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW())",
        )
        .bind(&event_id)
        .bind(event_type)
        .bind(source)
        .bind(payload)
        .bind(false)
        .bind(0)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(event_id)
    }

    async fn mark_processed(&self, entry_id: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE webhook_events SET processed = true, processed_at = NOW() WHERE id = $1",
        )
        .bind(entry_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    async fn record_failure(&self, entry_id: &str, error: &str) -> AppResult<()> {
        sqlx::query(
            "UPDATE webhook_events SET attempts = attempts + 1, last_error = $2 WHERE id = $1",
        )
        .bind(entry_id)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
