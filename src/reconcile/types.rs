//! Reconciliation domain types
//!
//! The correlation record tracked per submission, the host-facing payment
//! action, and the outcomes the synchronous return path can render.

use crate::gateway::ApiMode;
use serde::{Deserialize, Serialize};

/// Identifier of the payment integration, reported back to the host with
/// every action.
pub const PAYMENT_METHOD: &str = "payflexi";

/// Per-submission payment correlation state.
///
/// Created when a transaction is initiated, mutated by the webhook and
/// return channels, never deleted. `mode` partitions the whole keyspace so
/// live and test traffic cannot touch each other's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub submission_id: i64,
    pub mode: ApiMode,
    /// First local reference used for this submission; anchors installment
    /// chains.
    pub initial_reference: String,
    /// Most recent transaction reference seen on any channel.
    pub last_reference: String,
    /// Total the submission is expected to pay, smallest unit. The remote
    /// side may revise it upward.
    pub amount_ordered: i64,
    /// Cumulative confirmed payment, smallest unit.
    pub amount_paid: i64,
    /// Whether the host has marked the submission fulfilled.
    pub fulfilled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Host submission payment status values this engine writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Processing,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Stored statuses are plain text; anything unrecognized reads as
    /// `Unpaid` rather than failing the row decode.
    pub fn parse(value: &str) -> Self {
        match value {
            "processing" => PaymentStatus::Processing,
            "paid" => PaymentStatus::Paid,
            "failed" => PaymentStatus::Failed,
            _ => PaymentStatus::Unpaid,
        }
    }
}

/// View of a host form submission, as seen across the host boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub form_id: i64,
    pub email: String,
    pub currency: String,
    /// Page the submission was made from; cancel/decline redirects go back
    /// here.
    pub source_url: String,
    pub payment_status: PaymentStatus,
    pub is_spam: bool,
}

/// Kind of state change a payment action asks the host to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Complete,
    Refund,
    Fail,
}

/// Normalized instruction to the host platform after a reconciled event.
///
/// `action_id` is the dedup key: re-delivery of the same remote event maps
/// to the same id, so the host can treat repeats as no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAction {
    pub action_id: String,
    pub submission_id: i64,
    pub remote_transaction_id: String,
    pub cumulative_amount_paid: i64,
    pub currency: String,
    pub action_type: ActionType,
    pub ready_to_fulfill: bool,
    pub payment_date: Option<String>,
    pub payment_method: String,
}

impl PaymentAction {
    pub fn action_id_for(remote_transaction_id: &str, event_type: &str) -> String {
        format!("{}_{}", remote_transaction_id, event_type)
    }
}

/// What the synchronous return path tells the host to do with the browser.
///
/// This is a rendering instruction only; authoritative bookkeeping belongs
/// to the webhook channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderInstruction {
    /// Payment verified on this channel; show the submission's confirmation.
    Confirmation { submission_id: i64 },
    /// Checkout was cancelled or declined; send the browser back.
    RedirectToSource { url: String },
    /// The remote status could not be verified; render a generic notice and
    /// leave all stored amounts untouched.
    VerificationFailed,
    /// Nothing to show the browser (unknown or spam submission).
    Ignore,
}
