//! In-memory implementations of the storage and host traits.
//!
//! Used by the test suites and by embedders that do not want a database.
//! The correlation map applies the same merge policy as the Postgres store,
//! inside a mutex so racing webhook deliveries serialize per process.

use crate::error::{AppError, AppResult};
use crate::gateway::ApiMode;
use crate::reconcile::policy::{self, AmountReport};
use crate::reconcile::traits::{CorrelationStore, EventLog, SubmissionHost};
use crate::reconcile::types::{CorrelationRecord, PaymentStatus, Submission};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryCorrelationStore {
    records: Mutex<HashMap<(ApiMode, i64), CorrelationRecord>>,
}

impl MemoryCorrelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a record, for assertions.
    pub fn snapshot(&self, mode: ApiMode, submission_id: i64) -> Option<CorrelationRecord> {
        self.records
            .lock()
            .expect("correlation map poisoned")
            .get(&(mode, submission_id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("correlation map poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CorrelationStore for MemoryCorrelationStore {
    async fn create(
        &self,
        mode: ApiMode,
        submission_id: i64,
        local_reference: &str,
        amount_ordered: i64,
    ) -> AppResult<CorrelationRecord> {
        let mut records = self.records.lock().expect("correlation map poisoned");
        if records.contains_key(&(mode, submission_id)) {
            return Err(AppError::duplicate_submission(submission_id));
        }

        let now = chrono::Utc::now();
        let record = CorrelationRecord {
            submission_id,
            mode,
            initial_reference: local_reference.to_string(),
            last_reference: local_reference.to_string(),
            amount_ordered,
            amount_paid: 0,
            fulfilled: false,
            created_at: now,
            updated_at: now,
        };
        records.insert((mode, submission_id), record.clone());
        Ok(record)
    }

    async fn find_by_submission(
        &self,
        mode: ApiMode,
        submission_id: i64,
    ) -> AppResult<Option<CorrelationRecord>> {
        Ok(self
            .records
            .lock()
            .expect("correlation map poisoned")
            .get(&(mode, submission_id))
            .cloned())
    }

    async fn find_by_reference(
        &self,
        mode: ApiMode,
        reference: &str,
    ) -> AppResult<Option<CorrelationRecord>> {
        Ok(self
            .records
            .lock()
            .expect("correlation map poisoned")
            .values()
            .find(|record| {
                record.mode == mode
                    && (record.initial_reference == reference
                        || record.last_reference == reference)
            })
            .cloned())
    }

    async fn merge_amount(
        &self,
        mode: ApiMode,
        submission_id: i64,
        report: &AmountReport,
    ) -> AppResult<CorrelationRecord> {
        let mut records = self.records.lock().expect("correlation map poisoned");
        let record = records
            .get_mut(&(mode, submission_id))
            .ok_or_else(|| AppError::submission_not_found(submission_id))?;

        let outcome = policy::merge(record, report);
        record.amount_ordered = outcome.amount_ordered;
        record.amount_paid = outcome.amount_paid;
        record.last_reference = outcome.last_reference;
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }

    async fn record_return_payment(
        &self,
        mode: ApiMode,
        submission_id: i64,
        reference: &str,
        txn_amount: i64,
    ) -> AppResult<CorrelationRecord> {
        let mut records = self.records.lock().expect("correlation map poisoned");
        let record = records
            .get_mut(&(mode, submission_id))
            .ok_or_else(|| AppError::submission_not_found(submission_id))?;

        record.amount_paid = txn_amount;
        record.last_reference = reference.to_string();
        record.updated_at = chrono::Utc::now();
        Ok(record.clone())
    }

    async fn mark_fulfilled(&self, mode: ApiMode, submission_id: i64) -> AppResult<()> {
        let mut records = self.records.lock().expect("correlation map poisoned");
        let record = records
            .get_mut(&(mode, submission_id))
            .ok_or_else(|| AppError::submission_not_found(submission_id))?;
        record.fulfilled = true;
        record.updated_at = chrono::Utc::now();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySubmissionHost {
    submissions: Mutex<HashMap<i64, Submission>>,
}

impl MemorySubmissionHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, submission: Submission) {
        self.submissions
            .lock()
            .expect("submission map poisoned")
            .insert(submission.id, submission);
    }

    pub fn payment_status(&self, submission_id: i64) -> Option<PaymentStatus> {
        self.submissions
            .lock()
            .expect("submission map poisoned")
            .get(&submission_id)
            .map(|s| s.payment_status)
    }
}

#[async_trait]
impl SubmissionHost for MemorySubmissionHost {
    async fn find(&self, submission_id: i64) -> AppResult<Option<Submission>> {
        Ok(self
            .submissions
            .lock()
            .expect("submission map poisoned")
            .get(&submission_id)
            .cloned())
    }

    async fn set_payment_status(
        &self,
        submission_id: i64,
        status: PaymentStatus,
    ) -> AppResult<()> {
        let mut submissions = self.submissions.lock().expect("submission map poisoned");
        let submission = submissions
            .get_mut(&submission_id)
            .ok_or_else(|| AppError::submission_not_found(submission_id))?;
        submission.payment_status = status;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct LoggedEvent {
    pub id: String,
    pub event_type: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub attempts: i32,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryEventLog {
    entries: Mutex<Vec<LoggedEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LoggedEvent> {
        self.entries.lock().expect("event log poisoned").clone()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn record(
        &self,
        event_type: &str,
        source: &str,
        payload: serde_json::Value,
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();
        self.entries
            .lock()
            .expect("event log poisoned")
            .push(LoggedEvent {
                id: id.clone(),
                event_type: event_type.to_string(),
                source: source.to_string(),
                payload,
                processed: false,
                attempts: 0,
                last_error: None,
            });
        Ok(id)
    }

    async fn mark_processed(&self, entry_id: &str) -> AppResult<()> {
        let mut entries = self.entries.lock().expect("event log poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            entry.processed = true;
        }
        Ok(())
    }

    async fn record_failure(&self, entry_id: &str, error: &str) -> AppResult<()> {
        let mut entries = self.entries.lock().expect("event log poisoned");
        if let Some(entry) = entries.iter_mut().find(|e| e.id == entry_id) {
            entry.attempts += 1;
            entry.last_error = Some(error.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let store = MemoryCorrelationStore::new();
        store
            .create(ApiMode::Test, 1, "flexi-1-a", 5000)
            .await
            .unwrap();
        let err = store
            .create(ApiMode::Test, 1, "flexi-1-b", 5000)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_modes_do_not_cross() {
        let store = MemoryCorrelationStore::new();
        store
            .create(ApiMode::Test, 1, "flexi-1-a", 5000)
            .await
            .unwrap();
        // Same submission id in the other mode is a distinct record.
        store
            .create(ApiMode::Live, 1, "flexi-1-b", 7000)
            .await
            .unwrap();

        assert!(store
            .find_by_reference(ApiMode::Live, "flexi-1-a")
            .await
            .unwrap()
            .is_none());
        let live = store
            .find_by_submission(ApiMode::Live, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(live.amount_ordered, 7000);
    }

    #[tokio::test]
    async fn test_find_by_reference_matches_initial_and_last() {
        let store = MemoryCorrelationStore::new();
        store
            .create(ApiMode::Test, 9, "flexi-9-a", 5000)
            .await
            .unwrap();
        store
            .merge_amount(
                ApiMode::Test,
                9,
                &AmountReport {
                    reference: "R1".to_string(),
                    order_amount: 5000,
                    txn_amount: 2000,
                },
            )
            .await
            .unwrap();

        let by_initial = store
            .find_by_reference(ApiMode::Test, "flexi-9-a")
            .await
            .unwrap();
        let by_last = store.find_by_reference(ApiMode::Test, "R1").await.unwrap();
        assert!(by_initial.is_some());
        assert!(by_last.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_merges_lose_no_update() {
        let store = Arc::new(MemoryCorrelationStore::new());
        store
            .create(ApiMode::Test, 3, "flexi-3-a", 100_000)
            .await
            .unwrap();

        // Ten distinct partial installments land concurrently; each is
        // additive, so the final total must be their sum regardless of
        // interleaving.
        let mut handles = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .merge_amount(
                        ApiMode::Test,
                        3,
                        &AmountReport {
                            reference: format!("R{}", i),
                            order_amount: 100_000,
                            txn_amount: 1_000,
                        },
                    )
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let record = store.snapshot(ApiMode::Test, 3).unwrap();
        assert_eq!(record.amount_paid, 10_000);
    }

    #[tokio::test]
    async fn test_event_log_lifecycle() {
        let log = MemoryEventLog::new();
        let id = log
            .record("transaction.approved", "payflexi", serde_json::json!({}))
            .await
            .unwrap();
        log.record_failure(&id, "boom").await.unwrap();
        log.mark_processed(&id).await.unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].processed);
        assert_eq!(entries[0].attempts, 1);
        assert_eq!(entries[0].last_error.as_deref(), Some("boom"));
    }
}
