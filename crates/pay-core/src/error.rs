//! # Payment Error Types
//!
//! Typed error handling for the visa-fee payment service.
//! All payment operations return `Result<T, PaymentError>`.

use thiserror::Error;

/// Core error type for all payment operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Missing or invalid initiation fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors (missing credentials, unknown settings)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Inbound notification signature did not match the recomputed one
    #[error("Invalid signature from {gateway}")]
    SignatureMismatch { gateway: String },

    /// Timeout, non-2xx or malformed response from a gateway during initiation
    #[error("Gateway error [{gateway}] for {reference}: {message}")]
    GatewayCommunication {
        gateway: String,
        reference: String,
        message: String,
    },

    /// No payment record for this reference
    #[error("Payment not found: {reference}")]
    RecordNotFound { reference: String },

    /// A record with this reference already exists
    #[error("Duplicate payment reference: {reference}")]
    DuplicateReference { reference: String },

    /// Notification body could not be decoded
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// Payment record store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Shorthand for a gateway communication failure
    pub fn gateway(
        gateway: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        PaymentError::GatewayCommunication {
            gateway: gateway.into(),
            reference: reference.into(),
            message: message.into(),
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            PaymentError::Validation(_) => 400,
            PaymentError::Configuration(_) => 500,
            PaymentError::SignatureMismatch { .. } => 400,
            PaymentError::GatewayCommunication { .. } => 502,
            PaymentError::RecordNotFound { .. } => 404,
            PaymentError::DuplicateReference { .. } => 409,
            PaymentError::MalformedNotification(_) => 400,
            PaymentError::Store(_) => 500,
            PaymentError::Internal(_) => 500,
        }
    }

    /// The pending reference left behind by a failed initiation, if any
    pub fn pending_reference(&self) -> Option<&str> {
        match self {
            PaymentError::GatewayCommunication { reference, .. } => Some(reference),
            _ => None,
        }
    }
}

/// Result type alias for payment operations
pub type PaymentResult<T> = Result<T, PaymentError>;
