//! # Payment Gateway Trait
//!
//! Strategy trait implemented by the PayFast, PayGate and Peach adapters.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  PaymentGateway (trait)                     │
//! │  ├── initiate()             outbound: sign + persist        │
//! │  ├── verify_notification()  inbound: signature gate         │
//! │  └── kind() / ack_token()                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!          ┌─────────────────┼─────────────────┐
//!          │                 │                 │
//!  ┌───────┴───────┐ ┌───────┴───────┐ ┌───────┴───────┐
//!  │    PayFast    │ │    PayGate    │ │     Peach     │
//!  │  (form post)  │ │   (PayWeb3)   │ │ (COPYandPAY)  │
//!  └───────────────┘ └───────────────┘ └───────────────┘
//! ```

use crate::error::PaymentResult;
use crate::notification::NotificationFields;
use crate::record::PaymentOutcome;
use crate::request::InitiationRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// The three supported gateways
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    PayFast,
    PayGate,
    Peach,
}

impl GatewayKind {
    pub const ALL: [GatewayKind; 3] = [GatewayKind::PayFast, GatewayKind::PayGate, GatewayKind::Peach];

    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayKind::PayFast => "payfast",
            GatewayKind::PayGate => "paygate",
            GatewayKind::Peach => "peach",
        }
    }
}

impl std::fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the client continues to the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Checkout {
    /// Client auto-submits a form with these fields to `action_url`
    FormPost {
        action_url: String,
        fields: Vec<(String, String)>,
    },
    /// Client is sent to `url`
    Redirect { url: String },
}

/// Successful initiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiationResult {
    /// Reference of the pending record
    pub reference: String,
    pub gateway: GatewayKind,
    /// Whether the gateway config was in sandbox/test mode
    pub sandbox: bool,
    pub checkout: Checkout,
    /// Gateway-side request id (PayGate `PAY_REQUEST_ID`, Peach checkout id)
    pub gateway_request_id: Option<String>,
}

impl InitiationResult {
    /// Form target or redirect URL
    pub fn payment_url(&self) -> &str {
        match &self.checkout {
            Checkout::FormPost { action_url, .. } => action_url,
            Checkout::Redirect { url } => url,
        }
    }

    /// Signed form fields, for form-post checkouts
    pub fn form_fields(&self) -> Option<&[(String, String)]> {
        match &self.checkout {
            Checkout::FormPost { fields, .. } => Some(fields),
            Checkout::Redirect { .. } => None,
        }
    }
}

/// A notification whose signature has been verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedNotification {
    pub gateway: GatewayKind,
    /// Our reference embedded in the notification
    pub reference: String,
    /// Mapped outcome; `None` means the gateway code is not terminal or not recognized
    pub outcome: Option<PaymentOutcome>,
    /// Gateway transaction id
    pub payment_id: Option<String>,
    /// Outcome code as the gateway sent it (for logs)
    pub gateway_status: String,
}

/// Core trait for gateway adapters.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Validate the request, persist a pending record and prepare the checkout.
    ///
    /// For gateways with a server-to-server initiation call, a failure after
    /// the record was persisted is returned as `GatewayCommunication` carrying
    /// the pending reference; the record is not removed.
    async fn initiate(&self, request: &InitiationRequest) -> PaymentResult<InitiationResult>;

    /// Verify the signature of an inbound notification and map its outcome.
    ///
    /// Pure with respect to the record store.
    fn verify_notification(&self, fields: &NotificationFields) -> PaymentResult<VerifiedNotification>;

    /// Which gateway this adapter talks to.
    fn kind(&self) -> GatewayKind;

    /// Body the gateway expects in a successful notification response.
    fn ack_token(&self) -> &'static str {
        "OK"
    }
}

/// Type alias for a boxed gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;

/// Lookup of adapters by gateway
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<GatewayKind, BoxedPaymentGateway>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the same gateway
    pub fn register(&mut self, gateway: BoxedPaymentGateway) {
        self.gateways.insert(gateway.kind(), gateway);
    }

    /// Register with builder pattern
    pub fn with_gateway(mut self, gateway: BoxedPaymentGateway) -> Self {
        self.register(gateway);
        self
    }

    pub fn get(&self, kind: GatewayKind) -> Option<&BoxedPaymentGateway> {
        self.gateways.get(&kind)
    }

    /// Registered gateways in a stable order
    pub fn kinds(&self) -> Vec<GatewayKind> {
        GatewayKind::ALL
            .into_iter()
            .filter(|k| self.gateways.contains_key(k))
            .collect()
    }
}

/// Fallback when no public hostname is configured
pub const LOCAL_BASE_URL: &str = "http://localhost:5000";

/// Public base URL used to build return, cancel and notify URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    pub base_url: String,
}

impl CallbackUrls {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Resolve from an explicit base URL, else a deployment hostname, else localhost.
    pub fn resolve_base_url(app_base_url: Option<&str>, public_host: Option<&str>) -> Self {
        let explicit = app_base_url.map(str::trim).filter(|v| !v.is_empty());
        let host = public_host.map(str::trim).filter(|v| !v.is_empty());

        match (explicit, host) {
            (Some(url), _) => Self::new(url),
            (None, Some(host)) => Self::new(format!("https://{}", host)),
            (None, None) => Self::new(LOCAL_BASE_URL),
        }
    }

    /// Absolute URL for a path on this host
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether gateways would be unable to reach this host
    pub fn is_local(&self) -> bool {
        self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1")
    }
}

impl Default for CallbackUrls {
    fn default() -> Self {
        Self::new(LOCAL_BASE_URL)
    }
}
