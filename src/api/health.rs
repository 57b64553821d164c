use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub api_mode: String,
    pub gateway_configured: bool,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let version = env!("CARGO_PKG_VERSION").to_string();

    let credentials = state
        .config
        .gateway
        .credentials(state.config.gateway.api_mode);
    let gateway_configured = !state.config.gateway.enabled_gateway.is_empty()
        && !credentials.secret_key.is_empty();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version,
        environment: state.config.server.environment.clone(),
        api_mode: state.config.gateway.api_mode.to_string(),
        gateway_configured,
    };

    Ok(Json(response))
}
