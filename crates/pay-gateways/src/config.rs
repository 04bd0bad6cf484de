//! # Gateway Configuration
//!
//! Credentials and endpoints for the three gateways, read once at start-up
//! and passed by `Arc` into each adapter. Every setting has a sandbox
//! default except the Peach credentials, which must be supplied.

use pay_core::{CallbackUrls, GatewayKind, PaymentError, PaymentResult};
use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;

pub const PAYFAST_SANDBOX_URL: &str = "https://sandbox.payfast.co.za/eng/process";
pub const PAYFAST_LIVE_URL: &str = "https://www.payfast.co.za/eng/process";

pub const PAYGATE_INITIATE_URL: &str = "https://secure.paygate.co.za/payweb3/initiate.trans";
pub const PAYGATE_PROCESS_URL: &str = "https://secure.paygate.co.za/payweb3/process.trans";

pub const PEACH_TEST_URL: &str = "https://testsecure.peachpayments.com";
pub const PEACH_LIVE_URL: &str = "https://secure.peachpayments.com";

pub const DEFAULT_CURRENCY: &str = "ZAR";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Interpret a sandbox/test-mode flag.
///
/// Anything other than a case-insensitive `false` enables sandbox mode,
/// including an unset flag.
pub fn parse_enabled_flag(value: Option<&str>) -> bool {
    !matches!(value, Some(v) if v.eq_ignore_ascii_case("false"))
}

/// Variant of the key=value signature scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    /// Values concatenated as-is
    Raw,
    /// Values form-urlencoded (spaces as `+`)
    Encoded,
}

impl SignatureEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureEncoding::Raw => "raw",
            SignatureEncoding::Encoded => "encoded",
        }
    }
}

impl FromStr for SignatureEncoding {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(SignatureEncoding::Raw),
            "encoded" => Ok(SignatureEncoding::Encoded),
            other => Err(PaymentError::Configuration(format!(
                "unknown signature encoding '{}', expected 'raw' or 'encoded'",
                other
            ))),
        }
    }
}

/// Resolved PayFast configuration
#[derive(Debug, Clone)]
pub struct PayFastConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    pub passphrase: SecretString,
    pub sandbox: bool,
    /// Form target for the client-side POST
    pub process_url: String,
    pub encoding: SignatureEncoding,
}

impl PayFastConfig {
    /// Trimmed passphrase, `None` when not configured
    pub fn passphrase(&self) -> Option<&str> {
        non_empty_secret(&self.passphrase)
    }
}

/// Resolved PayGate PayWeb3 configuration
#[derive(Debug, Clone)]
pub struct PayGateConfig {
    pub paygate_id: String,
    pub encryption_key: SecretString,
    pub sandbox: bool,
    pub initiate_url: String,
    pub process_url: String,
    /// Encoding for PayFast-style notifications signed with PayGate credentials
    pub encoding: SignatureEncoding,
}

impl PayGateConfig {
    pub fn encryption_key(&self) -> &str {
        self.encryption_key.expose_secret().trim()
    }
}

/// Resolved Peach Payments configuration
#[derive(Debug, Clone)]
pub struct PeachConfig {
    pub entity_id: String,
    pub access_token: SecretString,
    pub test_mode: bool,
    pub api_url: String,
}

impl PeachConfig {
    /// Bearer token, also the HMAC key for request and webhook signatures
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token.expose_secret())
    }

    pub fn checkouts_url(&self) -> String {
        format!("{}/v1/checkouts", self.api_url)
    }

    /// Payment widget script for a checkout
    pub fn widget_url(&self, checkout_id: &str) -> String {
        format!(
            "{}/v1/paymentWidgets.js?checkoutId={}",
            self.api_url,
            urlencoding::encode(checkout_id)
        )
    }
}

/// Configuration for one gateway
#[derive(Debug, Clone)]
pub enum GatewayConfig {
    PayFast(PayFastConfig),
    PayGate(PayGateConfig),
    Peach(PeachConfig),
}

impl GatewayConfig {
    pub fn kind(&self) -> GatewayKind {
        match self {
            GatewayConfig::PayFast(_) => GatewayKind::PayFast,
            GatewayConfig::PayGate(_) => GatewayKind::PayGate,
            GatewayConfig::Peach(_) => GatewayKind::Peach,
        }
    }

    pub fn is_sandbox(&self) -> bool {
        match self {
            GatewayConfig::PayFast(c) => c.sandbox,
            GatewayConfig::PayGate(c) => c.sandbox,
            GatewayConfig::Peach(c) => c.test_mode,
        }
    }
}

/// Endpoint overrides, used to point adapters at a mock server
#[derive(Debug, Clone, Default)]
struct EndpointOverrides {
    payfast_process: Option<String>,
    paygate_initiate: Option<String>,
    paygate_process: Option<String>,
    peach_api: Option<String>,
}

/// All gateway settings, read once at start-up
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub payfast_merchant_id: String,
    pub payfast_merchant_key: String,
    pub payfast_passphrase: SecretString,
    pub payfast_sandbox: bool,
    pub payfast_encoding: SignatureEncoding,

    pub paygate_id: String,
    pub paygate_encryption_key: SecretString,
    pub paygate_sandbox: bool,
    pub paygate_encoding: SignatureEncoding,

    pub peach_entity_id: String,
    pub peach_access_token: SecretString,
    pub peach_test_mode: bool,

    /// Currency for every payment in this process
    pub currency: String,

    /// Public base URL for return, cancel and notify URLs
    pub callbacks: CallbackUrls,

    /// Bound on outbound initiation calls
    pub timeout: Duration,

    endpoints: EndpointOverrides,
}

impl GatewaySettings {
    /// Load settings from environment variables.
    ///
    /// Reads a `.env` file first if present. See [`GatewaySettings::from_lookup`]
    /// for the recognized keys.
    pub fn from_env() -> PaymentResult<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from any key/value lookup, applying defaults for absent keys.
    pub fn from_lookup<F>(lookup: F) -> PaymentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let encoding = |key: &str, default: SignatureEncoding| match lookup(key) {
            Some(value) => value.parse::<SignatureEncoding>(),
            None => Ok(default),
        };

        let timeout_secs = match lookup("GATEWAY_TIMEOUT_SECS") {
            Some(value) => value.trim().parse::<u64>().map_err(|_| {
                PaymentError::Configuration(format!(
                    "GATEWAY_TIMEOUT_SECS must be a whole number of seconds, got '{}'",
                    value
                ))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let currency = get("PAYMENT_CURRENCY", DEFAULT_CURRENCY).trim().to_uppercase();
        if currency.is_empty() {
            return Err(PaymentError::Configuration(
                "PAYMENT_CURRENCY must not be empty".to_string(),
            ));
        }

        Ok(Self {
            payfast_merchant_id: get("PAYFAST_MERCHANT_ID", "10000100"),
            payfast_merchant_key: get("PAYFAST_MERCHANT_KEY", "46f0cd694581a"),
            payfast_passphrase: SecretString::new(get("PAYFAST_PASSPHRASE", "jt7NOE43FZPn")),
            payfast_sandbox: parse_enabled_flag(lookup("PAYFAST_SANDBOX").as_deref()),
            payfast_encoding: encoding("PAYFAST_SIGNATURE_ENCODING", SignatureEncoding::Encoded)?,

            paygate_id: get("PAYGATE_ID", "10011072130"),
            paygate_encryption_key: SecretString::new(get("PAYGATE_ENCRYPTION_KEY", "secret")),
            paygate_sandbox: parse_enabled_flag(lookup("PAYGATE_SANDBOX").as_deref()),
            paygate_encoding: encoding("PAYGATE_SIGNATURE_ENCODING", SignatureEncoding::Raw)?,

            peach_entity_id: get("PEACH_ENTITY_ID", ""),
            peach_access_token: SecretString::new(get("PEACH_ACCESS_TOKEN", "")),
            peach_test_mode: parse_enabled_flag(lookup("PEACH_TEST_MODE").as_deref()),

            currency,
            callbacks: CallbackUrls::resolve_base_url(
                lookup("APP_BASE_URL").as_deref(),
                lookup("REPLIT_DEV_DOMAIN").as_deref(),
            ),
            timeout: Duration::from_secs(timeout_secs),
            endpoints: EndpointOverrides::default(),
        })
    }

    /// Resolve the configuration for one gateway
    pub fn resolve(&self, kind: GatewayKind) -> PaymentResult<GatewayConfig> {
        Ok(match kind {
            GatewayKind::PayFast => GatewayConfig::PayFast(self.payfast()),
            GatewayKind::PayGate => GatewayConfig::PayGate(self.paygate()),
            GatewayKind::Peach => GatewayConfig::Peach(self.peach()?),
        })
    }

    pub fn payfast(&self) -> PayFastConfig {
        let default_url = if self.payfast_sandbox {
            PAYFAST_SANDBOX_URL
        } else {
            PAYFAST_LIVE_URL
        };

        PayFastConfig {
            merchant_id: self.payfast_merchant_id.trim().to_string(),
            merchant_key: self.payfast_merchant_key.trim().to_string(),
            passphrase: self.payfast_passphrase.clone(),
            sandbox: self.payfast_sandbox,
            process_url: override_or(&self.endpoints.payfast_process, default_url),
            encoding: self.payfast_encoding,
        }
    }

    /// PayWeb3 uses the same host for test and live accounts; the
    /// account id decides which one a transaction runs against.
    pub fn paygate(&self) -> PayGateConfig {
        PayGateConfig {
            paygate_id: self.paygate_id.trim().to_string(),
            encryption_key: self.paygate_encryption_key.clone(),
            sandbox: self.paygate_sandbox,
            initiate_url: override_or(&self.endpoints.paygate_initiate, PAYGATE_INITIATE_URL),
            process_url: override_or(&self.endpoints.paygate_process, PAYGATE_PROCESS_URL),
            encoding: self.paygate_encoding,
        }
    }

    /// Fails with a configuration error when the entity id or access token is empty.
    pub fn peach(&self) -> PaymentResult<PeachConfig> {
        let entity_id = self.peach_entity_id.trim();
        if entity_id.is_empty() {
            return Err(PaymentError::Configuration(
                "PEACH_ENTITY_ID not set".to_string(),
            ));
        }
        if non_empty_secret(&self.peach_access_token).is_none() {
            return Err(PaymentError::Configuration(
                "PEACH_ACCESS_TOKEN not set".to_string(),
            ));
        }

        let default_url = if self.peach_test_mode {
            PEACH_TEST_URL
        } else {
            PEACH_LIVE_URL
        };

        Ok(PeachConfig {
            entity_id: entity_id.to_string(),
            access_token: SecretString::new(
                self.peach_access_token.expose_secret().trim().to_string(),
            ),
            test_mode: self.peach_test_mode,
            api_url: override_or(&self.endpoints.peach_api, default_url),
        })
    }

    /// Builder: set Peach credentials
    pub fn with_peach_credentials(
        mut self,
        entity_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        self.peach_entity_id = entity_id.into();
        self.peach_access_token = SecretString::new(access_token.into());
        self
    }

    /// Builder: set the public base URL
    pub fn with_callbacks(mut self, callbacks: CallbackUrls) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Builder: set the outbound call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder: set custom PayFast form target (for testing)
    pub fn with_payfast_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.payfast_process = Some(url.into());
        self
    }

    /// Builder: set custom PayWeb3 endpoints (for testing)
    pub fn with_paygate_urls(
        mut self,
        initiate_url: impl Into<String>,
        process_url: impl Into<String>,
    ) -> Self {
        self.endpoints.paygate_initiate = Some(initiate_url.into());
        self.endpoints.paygate_process = Some(process_url.into());
        self
    }

    /// Builder: set custom Peach API base URL (for testing)
    pub fn with_peach_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.peach_api = Some(url.into().trim_end_matches('/').to_string());
        self
    }
}

impl Default for GatewaySettings {
    /// Built-in sandbox defaults, ignoring the environment
    fn default() -> Self {
        Self {
            payfast_merchant_id: "10000100".to_string(),
            payfast_merchant_key: "46f0cd694581a".to_string(),
            payfast_passphrase: SecretString::new("jt7NOE43FZPn".to_string()),
            payfast_sandbox: true,
            payfast_encoding: SignatureEncoding::Encoded,
            paygate_id: "10011072130".to_string(),
            paygate_encryption_key: SecretString::new("secret".to_string()),
            paygate_sandbox: true,
            paygate_encoding: SignatureEncoding::Raw,
            peach_entity_id: String::new(),
            peach_access_token: SecretString::new(String::new()),
            peach_test_mode: true,
            currency: DEFAULT_CURRENCY.to_string(),
            callbacks: CallbackUrls::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            endpoints: EndpointOverrides::default(),
        }
    }
}

fn override_or(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

fn non_empty_secret(secret: &SecretString) -> Option<&str> {
    Some(secret.expose_secret().trim()).filter(|s| !s.is_empty())
}
