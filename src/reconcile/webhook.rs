//! Webhook reconciliation
//!
//! The asynchronous, authoritative leg of the flow. Deliveries are signed,
//! at-least-once, and possibly out of order; everything here is safe to run
//! for duplicated or racing deliveries, and the host deduplicates the
//! resulting actions by `action_id`.

use crate::error::{AppError, AppErrorKind, AppResult};
use crate::gateway::traits::PaymentGateway;
use crate::gateway::types::{
    ApiMode, TransactionStatus, WebhookEnvelope, EVENT_TRANSACTION_APPROVED,
};
use crate::reconcile::policy::AmountReport;
use crate::reconcile::traits::CorrelationStore;
use crate::reconcile::types::{ActionType, PaymentAction, PAYMENT_METHOD};
use std::sync::Arc;
use tracing::{debug, info, warn};

const PROVIDER: &str = "PayFlexi";

/// Result of processing one webhook delivery.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// A reconciled payment action for the host to apply.
    Action(PaymentAction),
    /// Valid delivery with nothing to do (uninteresting event or status).
    Ignored { reason: &'static str },
}

/// Process a raw webhook delivery.
///
/// The mode is read from the payload before any secret is chosen, because
/// it decides which credential pair verifies the signature; `gateway_for`
/// builds the mode-scoped client. A bad signature stops everything before
/// any store access.
pub async fn handle_webhook<F>(
    gateway_for: F,
    store: &dyn CorrelationStore,
    raw_body: &[u8],
    signature: Option<&str>,
) -> AppResult<WebhookOutcome>
where
    F: Fn(ApiMode) -> Arc<dyn PaymentGateway>,
{
    let envelope = WebhookEnvelope::from_bytes(raw_body).map_err(|e| {
        warn!("Undecipherable webhook payload: {}", e);
        AppError::remote_protocol(PROVIDER)
    })?;

    let mode = envelope.mode().map_err(|e| {
        warn!("Webhook payload carries no usable mode: {}", e);
        AppError::remote_protocol(PROVIDER)
    })?;

    let signature = signature.ok_or_else(|| {
        warn!("Webhook request has no signature header. Aborting.");
        AppError::new(AppErrorKind::WebhookValidationFailed)
    })?;

    let gateway = gateway_for(mode);
    if !gateway.validate_webhook_signature(raw_body, signature) {
        warn!("Webhook request is invalid. Aborting.");
        return Err(AppError::new(AppErrorKind::WebhookValidationFailed));
    }

    debug!("Processing {} mode webhook event", mode);

    let event_type = envelope.event.clone();
    let event = envelope.into_event().map_err(|e| {
        warn!("Webhook payload failed to decode: {}", e);
        AppError::remote_protocol(PROVIDER)
    })?;

    if event_type != EVENT_TRANSACTION_APPROVED || event.status != TransactionStatus::Approved {
        debug!(
            "Nothing to do for event '{}' with status {:?}",
            event_type, event.status
        );
        return Ok(WebhookOutcome::Ignored {
            reason: "event type or status not applicable",
        });
    }

    // Prefer the meta echo; fall back to the reference index. An event that
    // resolves to no submission is reported, not fatal.
    let submission_id = match event.submission_id {
        Some(id) => id,
        None => {
            let record = store.find_by_reference(mode, &event.reference).await?;
            match record {
                Some(record) => record.submission_id,
                None => {
                    return Err(AppError::submission_not_found(format!(
                        "transaction {}",
                        event.remote_transaction_id
                    )))
                }
            }
        }
    };

    let report = AmountReport::from_event(&event);
    let record = store.merge_amount(mode, submission_id, &report).await?;

    let action = PaymentAction {
        action_id: PaymentAction::action_id_for(&event.remote_transaction_id, &event.event_type),
        submission_id,
        remote_transaction_id: event.remote_transaction_id,
        cumulative_amount_paid: record.amount_paid,
        currency: event.currency,
        action_type: ActionType::Complete,
        ready_to_fulfill: !record.fulfilled,
        payment_date: event.created_at,
        payment_method: PAYMENT_METHOD.to_string(),
    };

    info!(
        "Webhook reconciled for submission {}: cumulative_amount_paid={}, action_id={}",
        submission_id, action.cumulative_amount_paid, action.action_id
    );

    Ok(WebhookOutcome::Action(action))
}
