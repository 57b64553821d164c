//! Transaction initiation
//!
//! Builds the create-transaction request for a submission, records the
//! correlation state, and hands back the hosted-checkout URL. Create is
//! all-or-nothing with respect to the correlation store: no record exists
//! unless the processor accepted the transaction.

use crate::config::SecurityConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::hooks::GatewayHooks;
use crate::gateway::token::{ReturnToken, RETURN_TOKEN_PARAM};
use crate::gateway::traits::PaymentGateway;
use crate::gateway::types::{ApiMode, CheckoutSession, TransactionIntent};
use crate::reconcile::traits::{CorrelationStore, SubmissionHost};
use crate::reconcile::types::PaymentStatus;
use tracing::{info, warn};
use uuid::Uuid;

/// Inputs for starting a checkout for one submission attempt.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub submission_id: i64,
    pub feed_id: i64,
    pub form_id: i64,
    /// Derived payment amount, smallest unit.
    pub amount: i64,
    /// Overrides the submission's own currency when set.
    pub currency: Option<String>,
    pub form_title: Option<String>,
    pub ip_address: Option<String>,
}

/// Initiate a hosted-checkout transaction.
///
/// The submission's payment status is optimistically set to `Processing`
/// before the remote call; if the processor then rejects the request the
/// submission stays in `Processing` and the error surfaces to the caller.
/// That inconsistency is accepted and left to host-side cleanup.
pub async fn initiate_checkout(
    gateway: &dyn PaymentGateway,
    store: &dyn CorrelationStore,
    host: &dyn SubmissionHost,
    security: &SecurityConfig,
    hooks: &GatewayHooks,
    mode: ApiMode,
    request: &CheckoutRequest,
) -> AppResult<CheckoutSession> {
    let submission = host
        .find(request.submission_id)
        .await?
        .ok_or_else(|| AppError::submission_not_found(request.submission_id))?;

    host.set_payment_status(request.submission_id, PaymentStatus::Processing)
        .await?;

    let local_reference = new_local_reference(&security.reference_namespace, request.submission_id);
    let token = ReturnToken::new(request.submission_id, request.feed_id, request.form_id)
        .encode(&security.return_token_secret);
    let callback_url = append_query(
        &submission.source_url,
        RETURN_TOKEN_PARAM,
        &token,
    );

    let mut meta = serde_json::json!({
        "title": request.form_title,
        "submission_id": request.submission_id,
        "source_url": submission.source_url,
        "ip_address": request.ip_address,
        "integration": "formflexi-gateway",
    });
    hooks.enrich_meta(request.submission_id, &mut meta);

    let currency = request
        .currency
        .clone()
        .unwrap_or_else(|| submission.currency.clone());

    let intent = TransactionIntent {
        local_reference,
        submission_id: request.submission_id,
        feed_id: request.feed_id,
        form_id: request.form_id,
        amount: request.amount,
        currency,
        mode,
        email: submission.email.clone(),
        callback_url,
        meta,
    };

    let session = match gateway.create_transaction(&intent).await {
        Ok(session) => session,
        Err(e) => {
            warn!(
                "Checkout initiation failed for submission {}: {}",
                request.submission_id, e
            );
            return Err(e);
        }
    };

    // The processor-acknowledged reference anchors the installment chain,
    // not the locally generated one (they normally coincide).
    store
        .create(mode, request.submission_id, &session.reference, request.amount)
        .await?;

    info!(
        "Checkout initiated for submission {}: reference={}",
        request.submission_id, session.reference
    );

    Ok(session)
}

/// `<namespace>-<submission>-<suffix>`, unique per attempt even under rapid
/// repeat submission.
fn new_local_reference(namespace: &str, submission_id: i64) -> String {
    format!(
        "{}-{}-{}",
        namespace,
        submission_id,
        Uuid::new_v4().simple()
    )
}

fn append_query(url: &str, name: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, name, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_reference_shape_and_uniqueness() {
        let a = new_local_reference("flexi", 42);
        let b = new_local_reference("flexi", 42);
        assert!(a.starts_with("flexi-42-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_append_query_handles_existing_params() {
        assert_eq!(
            append_query("https://host/page", "t", "abc"),
            "https://host/page?t=abc"
        );
        assert_eq!(
            append_query("https://host/page?x=1", "t", "abc"),
            "https://host/page?x=1&t=abc"
        );
    }
}
