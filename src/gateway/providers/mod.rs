//! Payment provider implementations
//!
//! Concrete implementations of the PaymentGateway trait.

pub mod payflexi;

pub use payflexi::{PayflexiConfig, PayflexiProvider};
