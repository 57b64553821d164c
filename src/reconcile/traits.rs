//! Storage and host-platform trait seams
//!
//! The engine never touches Postgres or the forms platform directly; it
//! depends on these interfaces. Production wires the sqlx-backed
//! implementations from `crate::database`, tests wire the in-memory ones
//! from `crate::reconcile::memory`.

use crate::error::AppResult;
use crate::gateway::ApiMode;
use crate::reconcile::policy::AmountReport;
use crate::reconcile::types::{CorrelationRecord, PaymentStatus, Submission};
use async_trait::async_trait;

/// Persistence for per-submission payment correlation state.
///
/// All lookups are scoped by `mode`; a test-mode event must never observe or
/// mutate a live-mode record.
#[async_trait]
pub trait CorrelationStore: Send + Sync {
    /// Create the record for a freshly initiated transaction with
    /// `amount_paid = 0`. Fails with `DuplicateSubmission` if the submission
    /// already has a record in this mode.
    async fn create(
        &self,
        mode: ApiMode,
        submission_id: i64,
        local_reference: &str,
        amount_ordered: i64,
    ) -> AppResult<CorrelationRecord>;

    async fn find_by_submission(
        &self,
        mode: ApiMode,
        submission_id: i64,
    ) -> AppResult<Option<CorrelationRecord>>;

    /// Look a record up by its initial or last reference.
    async fn find_by_reference(
        &self,
        mode: ApiMode,
        reference: &str,
    ) -> AppResult<Option<CorrelationRecord>>;

    /// Merge a reported amount into the record under the installment policy
    /// (`crate::reconcile::policy`). Must be an atomic read-modify-write per
    /// submission: webhook deliveries are at-least-once and race each other.
    /// Returns the updated record.
    async fn merge_amount(
        &self,
        mode: ApiMode,
        submission_id: i64,
        report: &AmountReport,
    ) -> AppResult<CorrelationRecord>;

    /// Return-path single-shot write: set `amount_paid` to the authoritative
    /// amount fetched for `reference`. A later webhook merge may supersede
    /// the value.
    async fn record_return_payment(
        &self,
        mode: ApiMode,
        submission_id: i64,
        reference: &str,
        txn_amount: i64,
    ) -> AppResult<CorrelationRecord>;

    /// Flip the fulfilled flag once the host has acted on a payment action.
    async fn mark_fulfilled(&self, mode: ApiMode, submission_id: i64) -> AppResult<()>;
}

/// Boundary to the host forms platform. Only what the payment flows need is
/// modeled here; submission storage and rendering stay the host's business.
#[async_trait]
pub trait SubmissionHost: Send + Sync {
    async fn find(&self, submission_id: i64) -> AppResult<Option<Submission>>;

    async fn set_payment_status(
        &self,
        submission_id: i64,
        status: PaymentStatus,
    ) -> AppResult<()>;
}

/// Append-only audit log of inbound webhook deliveries.
///
/// Purely observational: reconciliation correctness never depends on it, and
/// a logging failure must not block event processing.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Record a delivery before processing; returns the log entry id.
    async fn record(
        &self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
    ) -> AppResult<String>;

    async fn mark_processed(&self, entry_id: &str) -> AppResult<()>;

    async fn record_failure(&self, entry_id: &str, error: &str) -> AppResult<()>;
}
