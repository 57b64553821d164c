//! HTTP surface of the gateway service
//!
//! Thin axum handlers over the reconciliation engine. Handlers depend on the
//! engine's trait objects so the whole surface runs against in-memory
//! implementations in tests.

pub mod callback;
pub mod checkout;
pub mod health;

use crate::config::Config;
use crate::error::{AppError, AppErrorKind};
use crate::gateway::hooks::GatewayHooks;
use crate::gateway::providers::{PayflexiConfig, PayflexiProvider};
use crate::gateway::traits::PaymentGateway;
use crate::gateway::types::ApiMode;
use crate::reconcile::traits::{CorrelationStore, EventLog, SubmissionHost};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn CorrelationStore>,
    pub host: Arc<dyn SubmissionHost>,
    pub event_log: Arc<dyn EventLog>,
    pub hooks: GatewayHooks,
}

impl AppState {
    /// Build a processor client scoped to `mode`. A fresh client per request
    /// keeps credentials tied to the request being served; there is no
    /// ambient current-mode state to go stale.
    pub fn gateway_for(&self, mode: ApiMode) -> Arc<dyn PaymentGateway> {
        let config = PayflexiConfig::for_mode(&self.config.gateway, mode);
        Arc::new(PayflexiProvider::new(config).with_hooks(self.hooks.clone()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/payments/checkout", post(checkout::create_checkout))
        .route("/payments/return", get(callback::payment_return))
        .route("/payments/webhook", post(callback::payment_webhook))
        .with_state(state)
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Default status mapping for engine errors surfacing over HTTP.
pub fn status_for(error: &AppError) -> StatusCode {
    match &error.kind {
        AppErrorKind::RemoteRequestFailed { .. } | AppErrorKind::RemoteProtocolError { .. } => {
            StatusCode::BAD_GATEWAY
        }
        AppErrorKind::WebhookValidationFailed => StatusCode::UNAUTHORIZED,
        AppErrorKind::IntegrityCheckFailed => StatusCode::BAD_REQUEST,
        AppErrorKind::SubmissionNotFound { .. } => StatusCode::NOT_FOUND,
        AppErrorKind::DuplicateSubmission { .. } => StatusCode::CONFLICT,
        AppErrorKind::Configuration { .. }
        | AppErrorKind::Database(_)
        | AppErrorKind::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}
