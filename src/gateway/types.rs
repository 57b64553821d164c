//! Wire types for the PayFlexi transaction API and webhook payloads.
//!
//! Untrusted JSON is decoded into these structs at the boundary; business
//! logic only ever sees the typed `RemoteEvent`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Webhook event name emitted by the processor when a charge is approved.
pub const EVENT_TRANSACTION_APPROVED: &str = "transaction.approved";

/// Synthetic event name for status lookups made through `fetch_transaction`.
pub const EVENT_TRANSACTION_FETCHED: &str = "transaction.fetched";

/// Header carrying the HMAC-SHA512 signature of the raw webhook body.
pub const SIGNATURE_HEADER: &str = "X-Payflexi-Signature";

/// Live/test partition. Selects the credential pair and scopes every
/// correlation lookup; the two namespaces never cross-reconcile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    Live,
    Test,
}

impl ApiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiMode::Live => "live",
            ApiMode::Test => "test",
        }
    }
}

impl fmt::Display for ApiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "live" => Ok(ApiMode::Live),
            "test" => Ok(ApiMode::Test),
            other => Err(format!("API mode must be 'live' or 'test', got '{}'", other)),
        }
    }
}

/// Remote transaction status as reported by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Approved,
    Declined,
    Cancelled,
    Pending,
    Unknown,
}

impl TransactionStatus {
    /// Processor statuses are free-form strings on the wire; anything we do
    /// not recognize maps to `Unknown` rather than failing the decode.
    pub fn parse(value: &str) -> Self {
        match value {
            "approved" => TransactionStatus::Approved,
            "declined" => TransactionStatus::Declined,
            "cancelled" => TransactionStatus::Cancelled,
            "pending" => TransactionStatus::Pending,
            _ => TransactionStatus::Unknown,
        }
    }
}

/// A transaction to be created with the processor. Immutable once sent.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionIntent {
    pub local_reference: String,
    pub submission_id: i64,
    pub feed_id: i64,
    pub form_id: i64,
    /// Amount requested, in the currency's smallest unit.
    pub amount: i64,
    pub currency: String,
    pub mode: ApiMode,
    pub email: String,
    pub callback_url: String,
    pub meta: serde_json::Value,
}

/// Successful `create_transaction` result: where to send the customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
    pub reference: String,
}

/// Normalized payment event, produced from either the webhook channel or a
/// synchronous status fetch.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteEvent {
    pub event_type: String,
    pub remote_transaction_id: String,
    /// The event-supplied installment reference (`initial_reference` on the
    /// wire); falls back to the transaction id when the processor omits it.
    pub reference: String,
    pub status: TransactionStatus,
    /// Order total as restated by this event, smallest unit.
    pub amount: i64,
    /// Amount settled by this event alone, smallest unit.
    pub txn_amount: i64,
    pub currency: String,
    pub created_at: Option<String>,
    pub mode: ApiMode,
    pub submission_id: Option<i64>,
}

/// Failures turning a raw payload into a `RemoteEvent`.
#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload has no usable API mode: {0}")]
    Mode(String),
}

/// Raw webhook envelope: `{"event": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub data: TransactionData,
}

impl WebhookEnvelope {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, EventParseError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// The mode must be readable before any secret is chosen, since it
    /// decides which key verifies the signature.
    pub fn mode(&self) -> Result<ApiMode, EventParseError> {
        self.data.domain.parse().map_err(EventParseError::Mode)
    }

    pub fn into_event(self) -> Result<RemoteEvent, EventParseError> {
        let mode = self.mode()?;
        Ok(self.data.into_event(self.event, mode))
    }
}

/// Transaction object as the processor serializes it, shared by webhook
/// deliveries and `GET merchants/transactions/{reference}` responses.
#[derive(Debug, Deserialize)]
pub struct TransactionData {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub amount: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub txn_amount: i64,
    #[serde(default)]
    pub initial_reference: Option<String>,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
}

impl TransactionData {
    pub fn into_event(self, event_type: String, mode: ApiMode) -> RemoteEvent {
        let submission_id = self.meta.as_ref().and_then(meta_submission_id);
        let status = TransactionStatus::parse(&self.status);
        let reference = self
            .initial_reference
            .clone()
            .unwrap_or_else(|| self.id.clone());

        RemoteEvent {
            event_type,
            remote_transaction_id: self.id,
            reference,
            status,
            amount: self.amount,
            txn_amount: self.txn_amount,
            currency: self.currency,
            created_at: self.created_at,
            mode,
            submission_id,
        }
    }
}

/// Pull the submission id out of the opaque meta bag. The processor echoes
/// back whatever we sent at creation, but PHP-era integrations mean numbers
/// sometimes round-trip as strings.
fn meta_submission_id(meta: &serde_json::Value) -> Option<i64> {
    let value = meta.get("submission_id")?;
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| serde::de::Error::custom("amount out of range")),
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .or_else(|_| s.parse::<f64>().map(|f| f as i64))
            .map_err(|_| serde::de::Error::custom(format!("unparsable amount '{}'", s))),
        serde_json::Value::Null => Ok(0),
        other => Err(serde::de::Error::custom(format!(
            "expected numeric amount, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_envelope_decodes_typed_event() {
        let raw = serde_json::json!({
            "event": "transaction.approved",
            "data": {
                "id": 9021,
                "domain": "test",
                "status": "approved",
                "amount": 10000,
                "txn_amount": "4000",
                "initial_reference": "flexi-7-abc",
                "currency": "NGN",
                "created_at": "2023-04-11 09:30:00",
                "meta": { "submission_id": "7" }
            }
        });
        let envelope = WebhookEnvelope::from_bytes(&serde_json::to_vec(&raw).unwrap()).unwrap();
        assert_eq!(envelope.mode().unwrap(), ApiMode::Test);

        let event = envelope.into_event().unwrap();
        assert_eq!(event.event_type, EVENT_TRANSACTION_APPROVED);
        assert_eq!(event.remote_transaction_id, "9021");
        assert_eq!(event.reference, "flexi-7-abc");
        assert_eq!(event.status, TransactionStatus::Approved);
        assert_eq!(event.amount, 10000);
        assert_eq!(event.txn_amount, 4000);
        assert_eq!(event.submission_id, Some(7));
    }

    #[test]
    fn test_missing_reference_falls_back_to_transaction_id() {
        let data = TransactionData {
            id: "tx-1".to_string(),
            domain: "live".to_string(),
            status: "approved".to_string(),
            amount: 500,
            txn_amount: 500,
            initial_reference: None,
            currency: "USD".to_string(),
            created_at: None,
            meta: None,
        };
        let event = data.into_event(EVENT_TRANSACTION_APPROVED.to_string(), ApiMode::Live);
        assert_eq!(event.reference, "tx-1");
    }

    #[test]
    fn test_unknown_status_does_not_fail_decode() {
        assert_eq!(TransactionStatus::parse("settled"), TransactionStatus::Unknown);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let raw = br#"{"event":"transaction.approved","data":{"id":"1","domain":"sandbox"}}"#;
        let envelope = WebhookEnvelope::from_bytes(raw).unwrap();
        assert!(matches!(envelope.mode(), Err(EventParseError::Mode(_))));
    }

    #[test]
    fn test_api_mode_round_trip() {
        assert_eq!("live".parse::<ApiMode>().unwrap(), ApiMode::Live);
        assert_eq!(ApiMode::Test.to_string(), "test");
        assert!("global".parse::<ApiMode>().is_err());
    }
}
