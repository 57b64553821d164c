//! Payment gateway trait definition
//!
//! The reconciliation engine talks to the processor exclusively through this
//! interface so handlers can be exercised against a stub in tests.

use crate::error::AppResult;
use crate::gateway::types::{CheckoutSession, RemoteEvent, TransactionIntent};
use async_trait::async_trait;

/// Interface to the remote payment processor.
///
/// Implementations are constructed per request with the credential pair for
/// the mode being served; they hold no cross-request state beyond the HTTP
/// client.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted-checkout transaction.
    ///
    /// Returns the checkout URL the customer must be redirected to, plus the
    /// reference the processor acknowledged. Transport failures and
    /// processor-side rejections surface as errors; nothing is retried here.
    async fn create_transaction(&self, intent: &TransactionIntent) -> AppResult<CheckoutSession>;

    /// Fetch the authoritative status of a transaction by its reference.
    ///
    /// Used on the synchronous browser-return path, where the redirect
    /// itself is untrusted and only this lookup decides the outcome.
    async fn fetch_transaction(&self, reference: &str) -> AppResult<RemoteEvent>;

    /// Verify the keyed hash of a raw webhook body against the signature
    /// supplied in the processor's header. Comparison is constant time.
    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}
