use crate::database::error::DatabaseError;
use crate::error::{AppError, AppResult};
use crate::reconcile::traits::SubmissionHost;
use crate::reconcile::types::{PaymentStatus, Submission};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

/// Submission view as stored in `form_submissions`.
///
/// The forms platform owns this table; the gateway only reads the handful of
/// columns the payment flows need and writes the payment status.
#[derive(Debug, Clone, FromRow)]
struct SubmissionRow {
    id: i64,
    form_id: i64,
    email: String,
    currency: String,
    source_url: String,
    payment_status: String,
    is_spam: bool,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            form_id: row.form_id,
            email: row.email,
            currency: row.currency,
            source_url: row.source_url,
            payment_status: PaymentStatus::parse(&row.payment_status),
            is_spam: row.is_spam,
        }
    }
}

pub struct PgSubmissionHost {
    pool: PgPool,
}

impl PgSubmissionHost {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionHost for PgSubmissionHost {
    async fn find(&self, submission_id: i64) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            "SELECT id, form_id, email, currency, source_url, payment_status, is_spam \
             FROM form_submissions WHERE id = $1",
        )
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(Submission::from))
    }

    async fn set_payment_status(
        &self,
        submission_id: i64,
        status: PaymentStatus,
    ) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE form_submissions SET payment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(submission_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(AppError::submission_not_found(submission_id));
        }
        Ok(())
    }
}
