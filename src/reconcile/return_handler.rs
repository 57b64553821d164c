//! Browser return-redirect handling
//!
//! The synchronous, user-facing leg of the flow. The redirect itself is
//! untrusted: the integrity token only binds it to a submission, and the
//! payment outcome is always re-fetched from the processor. This path never
//! produces a payment action; it only decides what the browser sees. On any
//! verification problem it fails safe toward under-crediting and leaves
//! stored amounts alone.

use crate::config::SecurityConfig;
use crate::error::AppResult;
use crate::gateway::token::ReturnToken;
use crate::gateway::traits::PaymentGateway;
use crate::gateway::types::{ApiMode, TransactionStatus};
use crate::reconcile::traits::{CorrelationStore, SubmissionHost};
use crate::reconcile::types::RenderInstruction;
use tracing::{info, warn};

/// Query parameters of an inbound return redirect, already extracted by the
/// HTTP layer.
#[derive(Debug, Clone)]
pub struct ReturnRequest {
    /// The `payflexi_return` token.
    pub token: String,
    /// Reference supplied via the `pf_approved` marker.
    pub approved_reference: Option<String>,
    /// `pf_cancelled` marker present.
    pub cancelled: bool,
    /// `pf_declined` marker present.
    pub declined: bool,
}

pub async fn handle_return(
    gateway: &dyn PaymentGateway,
    store: &dyn CorrelationStore,
    host: &dyn SubmissionHost,
    security: &SecurityConfig,
    mode: ApiMode,
    request: &ReturnRequest,
) -> AppResult<RenderInstruction> {
    // Fails closed before any record is touched.
    let ids = ReturnToken::decode(&request.token, &security.return_token_secret)?;

    let submission = match host.find(ids.submission_id).await? {
        Some(submission) => submission,
        None => {
            warn!(
                "Return redirect for unknown submission {}. Aborting.",
                ids.submission_id
            );
            return Ok(RenderInstruction::Ignore);
        }
    };

    if submission.is_spam {
        warn!(
            "Return redirect for submission {} marked as spam. Aborting.",
            ids.submission_id
        );
        return Ok(RenderInstruction::Ignore);
    }

    if request.cancelled || request.declined {
        info!(
            "Checkout {} for submission {}; redirecting to source page",
            if request.cancelled { "cancelled" } else { "declined" },
            ids.submission_id
        );
        return Ok(RenderInstruction::RedirectToSource {
            url: submission.source_url,
        });
    }

    let reference = match &request.approved_reference {
        Some(reference) if !reference.is_empty() => reference.clone(),
        _ => {
            warn!(
                "Return redirect for submission {} carries no transaction reference",
                ids.submission_id
            );
            return Ok(RenderInstruction::VerificationFailed);
        }
    };

    // Only the processor's answer counts; the redirect markers prove nothing.
    let event = match gateway.fetch_transaction(&reference).await {
        Ok(event) => event,
        Err(e) => {
            warn!("Transaction {} could not be verified: {}", reference, e);
            return Ok(RenderInstruction::VerificationFailed);
        }
    };

    if event.status != TransactionStatus::Approved {
        warn!(
            "Transaction {} verification failed: status={:?}",
            reference, event.status
        );
        return Ok(RenderInstruction::VerificationFailed);
    }

    // Single-shot confirmation: this channel assumes a non-installment
    // payment and may be superseded by later webhook merges.
    match store
        .record_return_payment(mode, ids.submission_id, &event.reference, event.txn_amount)
        .await
    {
        Ok(record) => {
            info!(
                "Return payment recorded for submission {}: amount_paid={}",
                ids.submission_id, record.amount_paid
            );
            Ok(RenderInstruction::Confirmation {
                submission_id: ids.submission_id,
            })
        }
        Err(e) if e.is_not_found() => {
            warn!(
                "No correlation record for submission {} on return path",
                ids.submission_id
            );
            Ok(RenderInstruction::VerificationFailed)
        }
        Err(e) => Err(e),
    }
}
