//! Payment reconciliation engine
//!
//! Correlates remote transactions with form submissions and folds payment
//! signals from the webhook and browser-return channels into per-submission
//! cumulative amounts.

pub mod initiator;
pub mod memory;
pub mod policy;
pub mod return_handler;
pub mod traits;
pub mod types;
pub mod webhook;

pub use initiator::{initiate_checkout, CheckoutRequest};
pub use return_handler::{handle_return, ReturnRequest};
pub use traits::{CorrelationStore, EventLog, SubmissionHost};
pub use types::{CorrelationRecord, PaymentAction, RenderInstruction};
pub use webhook::{handle_webhook, WebhookOutcome};
