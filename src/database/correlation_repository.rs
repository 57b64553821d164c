use crate::database::error::DatabaseError;
use crate::database::transaction::DatabaseTransaction;
use crate::error::{AppError, AppResult};
use crate::gateway::ApiMode;
use crate::reconcile::policy::{self, AmountReport};
use crate::reconcile::traits::CorrelationStore;
use crate::reconcile::types::CorrelationRecord;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

const SELECT_COLUMNS: &str = "submission_id, mode, initial_reference, last_reference, \
     amount_ordered, amount_paid, fulfilled, created_at, updated_at";

/// Correlation record as stored in `payment_correlations`.
#[derive(Debug, Clone, FromRow)]
struct CorrelationRow {
    submission_id: i64,
    mode: String,
    initial_reference: String,
    last_reference: String,
    amount_ordered: i64,
    amount_paid: i64,
    fulfilled: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl CorrelationRow {
    fn into_record(self) -> AppResult<CorrelationRecord> {
        let mode: ApiMode = self
            .mode
            .parse()
            .map_err(|e: String| AppError::internal(format!("corrupt mode column: {}", e)))?;

        Ok(CorrelationRecord {
            submission_id: self.submission_id,
            mode,
            initial_reference: self.initial_reference,
            last_reference: self.last_reference,
            amount_ordered: self.amount_ordered,
            amount_paid: self.amount_paid,
            fulfilled: self.fulfilled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Postgres-backed correlation store.
///
/// `merge_amount` serializes racing webhook deliveries for the same
/// submission with a row lock; the policy itself is shared with the
/// in-memory store.
pub struct PgCorrelationStore {
    pool: PgPool,
}

impl PgCorrelationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CorrelationStore for PgCorrelationStore {
    async fn create(
        &self,
        mode: ApiMode,
        submission_id: i64,
        local_reference: &str,
        amount_ordered: i64,
    ) -> AppResult<CorrelationRecord> {
        let row = sqlx::query_as::<_, CorrelationRow>(
            "INSERT INTO payment_correlations \
             (submission_id, mode, initial_reference, last_reference, amount_ordered, amount_paid, fulfilled, created_at, updated_at) \
             VALUES ($1, $2, $3, $3, $4, 0, false, NOW(), NOW()) \
             ON CONFLICT (mode, submission_id) DO NOTHING \
             RETURNING submission_id, mode, initial_reference, last_reference, \
                       amount_ordered, amount_paid, fulfilled, created_at, updated_at",
        )
        .bind(submission_id)
        .bind(mode.as_str())
        .bind(local_reference)
        .bind(amount_ordered)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => row.into_record(),
            None => Err(AppError::duplicate_submission(submission_id)),
        }
    }

    async fn find_by_submission(
        &self,
        mode: ApiMode,
        submission_id: i64,
    ) -> AppResult<Option<CorrelationRecord>> {
        let row = sqlx::query_as::<_, CorrelationRow>(&format!(
            "SELECT {} FROM payment_correlations WHERE mode = $1 AND submission_id = $2",
            SELECT_COLUMNS
        ))
        .bind(mode.as_str())
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(CorrelationRow::into_record).transpose()
    }

    async fn find_by_reference(
        &self,
        mode: ApiMode,
        reference: &str,
    ) -> AppResult<Option<CorrelationRecord>> {
        let row = sqlx::query_as::<_, CorrelationRow>(&format!(
            "SELECT {} FROM payment_correlations \
             WHERE mode = $1 AND (initial_reference = $2 OR last_reference = $2)",
            SELECT_COLUMNS
        ))
        .bind(mode.as_str())
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(CorrelationRow::into_record).transpose()
    }

    async fn merge_amount(
        &self,
        mode: ApiMode,
        submission_id: i64,
        report: &AmountReport,
    ) -> AppResult<CorrelationRecord> {
        let mut tx = DatabaseTransaction::begin(&self.pool).await?;

        let row = sqlx::query_as::<_, CorrelationRow>(&format!(
            "SELECT {} FROM payment_correlations \
             WHERE mode = $1 AND submission_id = $2 FOR UPDATE",
            SELECT_COLUMNS
        ))
        .bind(mode.as_str())
        .bind(submission_id)
        .fetch_optional(&mut **tx.tx_mut())
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let record = match row {
            Some(row) => row.into_record()?,
            None => {
                tx.rollback().await?;
                return Err(AppError::submission_not_found(submission_id));
            }
        };

        let outcome = policy::merge(&record, report);

        let updated = sqlx::query_as::<_, CorrelationRow>(
            "UPDATE payment_correlations \
             SET amount_ordered = $3, amount_paid = $4, last_reference = $5, updated_at = NOW() \
             WHERE mode = $1 AND submission_id = $2 \
             RETURNING submission_id, mode, initial_reference, last_reference, \
                       amount_ordered, amount_paid, fulfilled, created_at, updated_at",
        )
        .bind(mode.as_str())
        .bind(submission_id)
        .bind(outcome.amount_ordered)
        .bind(outcome.amount_paid)
        .bind(&outcome.last_reference)
        .fetch_one(&mut **tx.tx_mut())
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await?;

        updated.into_record()
    }

    async fn record_return_payment(
        &self,
        mode: ApiMode,
        submission_id: i64,
        reference: &str,
        txn_amount: i64,
    ) -> AppResult<CorrelationRecord> {
        let row = sqlx::query_as::<_, CorrelationRow>(
            "UPDATE payment_correlations \
             SET amount_paid = $3, last_reference = $4, updated_at = NOW() \
             WHERE mode = $1 AND submission_id = $2 \
             RETURNING submission_id, mode, initial_reference, last_reference, \
                       amount_ordered, amount_paid, fulfilled, created_at, updated_at",
        )
        .bind(mode.as_str())
        .bind(submission_id)
        .bind(txn_amount)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some(row) => row.into_record(),
            None => Err(AppError::submission_not_found(submission_id)),
        }
    }

    async fn mark_fulfilled(&self, mode: ApiMode, submission_id: i64) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE payment_correlations SET fulfilled = true, updated_at = NOW() \
             WHERE mode = $1 AND submission_id = $2",
        )
        .bind(mode.as_str())
        .bind(submission_id)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(AppError::submission_not_found(submission_id));
        }
        Ok(())
    }
}
