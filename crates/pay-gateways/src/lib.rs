//! # pay-gateways
//!
//! PayFast, PayGate and Peach Payments adapters for the visa-fee payment service.
//!
//! | Gateway | Initiation                          | Notification signature        |
//! |---------|-------------------------------------|-------------------------------|
//! | PayFast | signed form, client-side POST       | key=value MD5 (+ passphrase)  |
//! | PayGate | PayWeb3 server call, then redirect  | value checksum MD5 (+ key)    |
//! | Peach   | COPYandPAY checkout, widget URL     | sorted-key HMAC-SHA256        |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pay_core::{GatewayKind, InMemoryPaymentStore, InitiationRequest};
//! use pay_gateways::{build_registry, GatewayContext, GatewaySettings, Reconciler};
//!
//! let store = InMemoryPaymentStore::shared();
//! let ctx = GatewayContext::new(GatewaySettings::from_env()?, store.clone());
//! let registry = build_registry(&ctx)?;
//!
//! // Start a payment
//! let result = registry
//!     .get(GatewayKind::PayFast)
//!     .unwrap()
//!     .initiate(&request)
//!     .await?;
//!
//! // Later, in the notify endpoint:
//! let reconciler = Reconciler::new(registry, store);
//! let ack = reconciler.reconcile(GatewayKind::PayFast, &body).await?;
//! ```

pub mod config;
pub mod context;
pub mod form;
pub mod payfast;
pub mod paygate;
pub mod peach;
pub mod reconcile;
pub mod signature;

use pay_core::{GatewayRegistry, PaymentResult};
use std::sync::Arc;

// Re-exports
pub use config::{
    parse_enabled_flag, GatewayConfig, GatewaySettings, PayFastConfig, PayGateConfig,
    PeachConfig, SignatureEncoding,
};
pub use context::GatewayContext;
pub use form::{decode_form_response, FormDecodeError, FormResponse};
pub use payfast::PayFastGateway;
pub use paygate::PayGateGateway;
pub use peach::PeachGateway;
pub use reconcile::{Ack, Disposition, Reconciler};
pub use signature::{itn_signature, payfast_signature, paygate_checksum, peach_signature};

/// Register all three gateways.
///
/// Peach is registered even without credentials; its initiation then fails
/// with a configuration error.
pub fn build_registry(ctx: &GatewayContext) -> PaymentResult<GatewayRegistry> {
    Ok(GatewayRegistry::new()
        .with_gateway(Arc::new(PayFastGateway::new(ctx.clone())))
        .with_gateway(Arc::new(PayGateGateway::new(ctx.clone())?))
        .with_gateway(Arc::new(PeachGateway::new(ctx.clone())?)))
}
