//! Inbound payment callbacks: the browser return redirect and the signed
//! processor webhook.

use crate::api::{status_for, AppState, ErrorBody};
use crate::error::AppErrorKind;
use crate::reconcile::return_handler::{handle_return, ReturnRequest};
use crate::reconcile::types::{PaymentAction, RenderInstruction};
use crate::reconcile::webhook::{handle_webhook, WebhookOutcome};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::gateway::types::SIGNATURE_HEADER;

#[derive(Debug, Deserialize)]
pub struct ReturnParams {
    #[serde(rename = "payflexi_return")]
    pub token: Option<String>,
    pub pf_approved: Option<String>,
    pub pf_cancelled: Option<String>,
    pub pf_declined: Option<String>,
}

/// Browser return from hosted checkout.
pub async fn payment_return(
    State(state): State<AppState>,
    Query(params): Query<ReturnParams>,
) -> Response {
    let token = match params.token {
        Some(token) => token,
        None => {
            return (StatusCode::BAD_REQUEST, Html("Missing return token")).into_response();
        }
    };

    let request = ReturnRequest {
        token,
        approved_reference: params.pf_approved,
        cancelled: params.pf_cancelled.is_some(),
        declined: params.pf_declined.is_some(),
    };

    let mode = state.config.gateway.api_mode;
    let gateway = state.gateway_for(mode);

    let instruction = match handle_return(
        gateway.as_ref(),
        state.store.as_ref(),
        state.host.as_ref(),
        &state.config.security,
        mode,
        &request,
    )
    .await
    {
        Ok(instruction) => instruction,
        Err(e) => return e.into_response(),
    };

    match instruction {
        RenderInstruction::Confirmation { submission_id } => (
            StatusCode::OK,
            Html(format!(
                "<p>Payment received. Your submission #{} is confirmed.</p>",
                submission_id
            )),
        )
            .into_response(),
        RenderInstruction::RedirectToSource { url } => Redirect::to(&url).into_response(),
        RenderInstruction::VerificationFailed => (
            StatusCode::OK,
            Html("<p>We could not verify your payment yet. If you were charged, it will be reflected shortly.</p>".to_string()),
        )
            .into_response(),
        RenderInstruction::Ignore => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<PaymentAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Signed server-to-server payment notification.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    // Record the delivery before touching it; the audit trail must not
    // gate processing, so logging failures only warn.
    let payload_value: Option<serde_json::Value> = serde_json::from_slice(&body).ok();
    let entry_id = match &payload_value {
        Some(value) => {
            let event_type = value
                .get("event")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown");
            match state
                .event_log
                .record(event_type, "payflexi", value.clone())
                .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Failed to log webhook delivery: {}", e);
                    None
                }
            }
        }
        None => None,
    };

    let result = handle_webhook(
        |mode| state.gateway_for(mode),
        state.store.as_ref(),
        &body,
        signature,
    )
    .await;

    match result {
        Ok(outcome) => {
            if let Some(id) = &entry_id {
                if let Err(e) = state.event_log.mark_processed(id).await {
                    warn!("Failed to mark webhook delivery processed: {}", e);
                }
            }
            match outcome {
                WebhookOutcome::Action(action) => (
                    StatusCode::OK,
                    Json(WebhookAck {
                        status: "processed",
                        action: Some(action),
                        reason: None,
                    }),
                )
                    .into_response(),
                WebhookOutcome::Ignored { reason } => (
                    StatusCode::OK,
                    Json(WebhookAck {
                        status: "ignored",
                        action: None,
                        reason: Some(reason.to_string()),
                    }),
                )
                    .into_response(),
            }
        }
        Err(e) => {
            if let Some(id) = &entry_id {
                if let Err(log_err) = state.event_log.record_failure(id, &e.to_string()).await {
                    warn!("Failed to record webhook failure: {}", log_err);
                }
            }
            // An undecipherable inbound payload is the sender's problem, not
            // an upstream outage.
            let status = match &e.kind {
                AppErrorKind::RemoteProtocolError { .. } => StatusCode::BAD_REQUEST,
                _ => status_for(&e),
            };
            (
                status,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}
