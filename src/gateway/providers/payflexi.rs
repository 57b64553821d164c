//! PayFlexi payment provider implementation
//!
//! Integration with the PayFlexi hosted-checkout transaction API: creating
//! transactions, fetching authoritative status, and validating webhook
//! signatures. One provider instance serves exactly one API mode; callers
//! construct it per request from the mode-resolved credentials.

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::gateway::hooks::GatewayHooks;
use crate::gateway::traits::PaymentGateway;
use crate::gateway::types::{
    ApiMode, CheckoutSession, RemoteEvent, TransactionData, TransactionIntent,
    EVENT_TRANSACTION_FETCHED,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

const PROVIDER: &str = "PayFlexi";

/// PayFlexi provider configuration, resolved for a single mode.
#[derive(Debug, Clone)]
pub struct PayflexiConfig {
    pub mode: ApiMode,
    /// Secret key for the mode; signs requests and webhook hashes.
    pub secret_key: String,
    /// Public key for the mode. Unused by the server-side flows here but
    /// part of the credential pair handed to embedders.
    pub public_key: String,
    /// API base URL (defaults to https://api.payflexi.co)
    pub base_url: String,
    /// Gateway slug connected on the PayFlexi dashboard (e.g. "stripe")
    pub gateway: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl PayflexiConfig {
    /// Build the configuration for `mode` out of the service-wide gateway
    /// settings.
    pub fn for_mode(settings: &GatewayConfig, mode: ApiMode) -> Self {
        let credentials = settings.credentials(mode);
        Self {
            mode,
            secret_key: credentials.secret_key,
            public_key: credentials.public_key,
            base_url: settings.base_url.clone(),
            gateway: settings.enabled_gateway.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

/// PayFlexi payment provider
pub struct PayflexiProvider {
    config: PayflexiConfig,
    client: Client,
    hooks: GatewayHooks,
}

impl PayflexiProvider {
    /// Create a new provider instance for one mode.
    pub fn new(config: PayflexiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            client,
            hooks: GatewayHooks::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: GatewayHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn mode(&self) -> ApiMode {
        self.config.mode
    }

    /// Make an authenticated request to the PayFlexi API.
    ///
    /// Requests are sent exactly once; failures surface to the caller and
    /// any retry policy lives outside this client.
    async fn make_request(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> AppResult<serde_json::Value> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.config.secret_key))
            .header("Content-Type", "application/json");

        for (name, value) in self.hooks.extra_headers() {
            request = request.header(name, value);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("PayFlexi request error: {}", e);
            AppError::remote_request(PROVIDER, e.to_string())
        })?;

        let status = response.status();
        let response_text = response.text().await.unwrap_or_default();

        let value: serde_json::Value = match serde_json::from_str(&response_text) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to parse PayFlexi response: {}", e);
                return Err(AppError::remote_protocol(PROVIDER));
            }
        };

        if value.get("errors").and_then(|e| e.as_bool()).unwrap_or(false) {
            let message = value
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("request rejected")
                .to_string();
            error!("PayFlexi API error: {}", message);
            return Err(AppError::remote_request(PROVIDER, message));
        }

        if !status.is_success() {
            let message = format!("HTTP {}: {}", status, response_text);
            error!("PayFlexi API error: {}", message);
            return Err(AppError::remote_request(PROVIDER, message));
        }

        Ok(value)
    }
}

#[async_trait]
impl PaymentGateway for PayflexiProvider {
    async fn create_transaction(&self, intent: &TransactionIntent) -> AppResult<CheckoutSession> {
        info!(
            "Initiating PayFlexi transaction: {} {} {}",
            intent.amount, intent.currency, intent.local_reference
        );

        let payload = serde_json::json!({
            "email": intent.email,
            "currency": intent.currency,
            "gateway": self.config.gateway,
            "amount": intent.amount,
            "reference": intent.local_reference,
            "callback_url": intent.callback_url,
            "domain": intent.mode.as_str(),
            "meta": intent.meta,
        });

        let value = self
            .make_request(reqwest::Method::POST, "merchants/transactions/", Some(&payload))
            .await?;

        let response: CreateTransactionResponse =
            serde_json::from_value(value).map_err(|e| {
                error!("Unexpected create-transaction response shape: {}", e);
                AppError::remote_protocol(PROVIDER)
            })?;

        info!(
            "PayFlexi transaction initiated: reference={}",
            response.reference
        );

        Ok(CheckoutSession {
            checkout_url: response.checkout_url,
            reference: response.reference,
        })
    }

    async fn fetch_transaction(&self, reference: &str) -> AppResult<RemoteEvent> {
        info!("Fetching PayFlexi transaction: reference={}", reference);

        let value = self
            .make_request(
                reqwest::Method::GET,
                &format!("merchants/transactions/{}", reference),
                None,
            )
            .await?;

        let response: FetchTransactionResponse =
            serde_json::from_value(value).map_err(|e| {
                error!("Unexpected fetch-transaction response shape: {}", e);
                AppError::remote_protocol(PROVIDER)
            })?;

        let event = response
            .data
            .into_event(EVENT_TRANSACTION_FETCHED.to_string(), self.config.mode);

        info!(
            "PayFlexi transaction fetched: reference={}, status={:?}",
            reference, event.status
        );

        Ok(event)
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        use hmac::{Hmac, Mac};
        use sha2::Sha512;

        type HmacSha512 = Hmac<Sha512>;

        let mut mac = HmacSha512::new_from_slice(self.config.secret_key.as_bytes())
            .expect("HMAC can take key of any size");

        mac.update(payload);
        let computed_signature = hex::encode(mac.finalize().into_bytes());

        // PayFlexi sends the signature as a hex string
        let provided_signature = signature.trim();

        // Constant-time comparison to prevent timing attacks
        if computed_signature.len() != provided_signature.len() {
            return false;
        }

        computed_signature
            .as_bytes()
            .iter()
            .zip(provided_signature.as_bytes().iter())
            .fold(0, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

// Create transaction response, top-level fields
#[derive(Debug, Deserialize)]
struct CreateTransactionResponse {
    reference: String,
    checkout_url: String,
}

// Fetch transaction response, wrapped under `data`
#[derive(Debug, Deserialize)]
struct FetchTransactionResponse {
    data: TransactionData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    fn create_test_provider() -> PayflexiProvider {
        let config = PayflexiConfig {
            mode: ApiMode::Test,
            secret_key: "sk_test_test_key".to_string(),
            public_key: "pk_test_test_key".to_string(),
            base_url: "https://api.payflexi.co".to_string(),
            gateway: "stripe".to_string(),
            timeout_secs: 60,
        };
        PayflexiProvider::new(config)
    }

    fn sign(payload: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_webhook_signature_validation_valid() {
        let provider = create_test_provider();
        let payload = br#"{"event":"transaction.approved"}"#;
        let signature = sign(payload, "sk_test_test_key");
        assert!(provider.validate_webhook_signature(payload, &signature));
    }

    #[test]
    fn test_webhook_signature_validation_invalid() {
        let provider = create_test_provider();
        let payload = b"test payload";
        let result = provider.validate_webhook_signature(payload, "invalid_signature");
        assert!(!result, "Invalid signature should return false");
    }

    #[test]
    fn test_webhook_signature_wrong_secret_rejected() {
        let provider = create_test_provider();
        let payload = br#"{"event":"transaction.approved"}"#;
        let signature = sign(payload, "some_other_key");
        assert!(!provider.validate_webhook_signature(payload, &signature));
    }

    #[test]
    fn test_webhook_signature_modified_payload_rejected() {
        let provider = create_test_provider();
        let payload = br#"{"event":"transaction.approved"}"#;
        let signature = sign(payload, "sk_test_test_key");
        let tampered = br#"{"event":"transaction.approved","amount":1}"#;
        assert!(!provider.validate_webhook_signature(tampered, &signature));
    }

    #[test]
    fn test_config_for_mode_selects_credentials() {
        let settings = GatewayConfig {
            base_url: "https://api.payflexi.co".to_string(),
            enabled_gateway: "stripe".to_string(),
            api_mode: ApiMode::Live,
            live_secret_key: "sk_live".to_string(),
            live_public_key: "pk_live".to_string(),
            test_secret_key: "sk_test".to_string(),
            test_public_key: "pk_test".to_string(),
            timeout_secs: 60,
        };

        let live = PayflexiConfig::for_mode(&settings, ApiMode::Live);
        assert_eq!(live.secret_key, "sk_live");
        let test = PayflexiConfig::for_mode(&settings, ApiMode::Test);
        assert_eq!(test.secret_key, "sk_test");
        assert_eq!(test.gateway, "stripe");
    }
}
