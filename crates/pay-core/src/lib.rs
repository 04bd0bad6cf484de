//! # pay-core
//!
//! Core types and traits for the visa-fee payment service.
//!
//! This crate provides:
//! - `PaymentGateway` trait implemented by each gateway adapter
//! - `InitiationRequest` and its validation into an `Applicant`
//! - `PaymentRecord` and the pending-to-terminal status state machine
//! - `PaymentStore` trait with an in-memory implementation
//! - `ReferenceGenerator` for unique `UAE-PAY-<ms>` references
//! - `PaymentError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pay_core::{GatewayKind, InitiationRequest};
//! use rust_decimal_macros::dec;
//!
//! let request = InitiationRequest::new("APP-1", "John Smith", "john@example.com", dec!(350));
//! let gateway = registry.get(GatewayKind::PayFast).unwrap();
//!
//! // Persists a pending record and returns the signed form
//! let result = gateway.initiate(&request).await?;
//! ```

pub mod error;
pub mod gateway;
pub mod notification;
pub mod record;
pub mod reference;
pub mod request;
pub mod store;

// Re-exports for convenience
pub use error::{PaymentError, PaymentResult};
pub use gateway::{
    BoxedPaymentGateway, CallbackUrls, Checkout, GatewayKind, GatewayRegistry, InitiationResult,
    PaymentGateway, VerifiedNotification, LOCAL_BASE_URL,
};
pub use notification::NotificationFields;
pub use record::{PaymentOutcome, PaymentRecord, PaymentStatus, Transition};
pub use reference::{ReferenceGenerator, REFERENCE_PREFIX};
pub use request::{
    round_to_cents, split_name, Applicant, InitiationRequest, DEFAULT_DESCRIPTION, MAX_AMOUNT,
};
pub use store::{InMemoryPaymentStore, PaymentStore, SharedPaymentStore};
