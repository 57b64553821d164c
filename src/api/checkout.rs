use crate::api::AppState;
use crate::error::AppError;
use crate::gateway::types::{ApiMode, CheckoutSession};
use crate::reconcile::initiator::{initiate_checkout, CheckoutRequest};
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CheckoutPayload {
    pub submission_id: i64,
    pub feed_id: i64,
    pub form_id: i64,
    /// Derived payment amount, smallest unit.
    pub amount: i64,
    pub currency: Option<String>,
    /// Overrides the configured default mode for this attempt.
    pub mode: Option<ApiMode>,
    pub form_title: Option<String>,
    pub ip_address: Option<String>,
}

/// Start a hosted checkout for a submission.
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutPayload>,
) -> Result<Json<CheckoutSession>, AppError> {
    let mode = payload.mode.unwrap_or(state.config.gateway.api_mode);
    let gateway = state.gateway_for(mode);

    let request = CheckoutRequest {
        submission_id: payload.submission_id,
        feed_id: payload.feed_id,
        form_id: payload.form_id,
        amount: payload.amount,
        currency: payload.currency,
        form_title: payload.form_title,
        ip_address: payload.ip_address,
    };

    let session = initiate_checkout(
        gateway.as_ref(),
        state.store.as_ref(),
        state.host.as_ref(),
        &state.config.security,
        &state.hooks,
        mode,
        &request,
    )
    .await?;

    Ok(Json(session))
}
