//! # Canonical Signer
//!
//! Signature and checksum schemes for the three gateways. All functions are
//! pure over their inputs and serve both outbound signing and inbound
//! verification.
//!
//! | Scheme        | Input                                   | Digest       |
//! |---------------|-----------------------------------------|--------------|
//! | key=value     | `k=v&k=v` in table order + `&passphrase=` | MD5 hex      |
//! | ITN key=value | `k=v&k=v` in received order + `&passphrase=` | MD5 hex    |
//! | checksum      | values concatenated in table order + key  | MD5 hex      |
//! | sorted HMAC   | `k=v&k=v` sorted by key                   | HMAC-SHA256  |
//!
//! Field tables are typed structs with one optional field per wire name.
//! Absent and empty values are skipped entirely.

use crate::config::SignatureEncoding;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use pay_core::GatewayKind;
use sha2::Sha256;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// A typed field table with a fixed signing order
pub trait OrderedFields {
    /// Present, non-empty fields in signing order, values trimmed
    fn to_pairs(&self) -> Vec<(&'static str, &str)>;

    /// Names of the fields that would be signed
    fn signed_names(&self) -> Vec<&'static str> {
        self.to_pairs().into_iter().map(|(name, _)| name).collect()
    }
}

macro_rules! ordered_fields {
    (
        $(#[$meta:meta])*
        $name:ident { $($field:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq)]
        pub struct $name {
            $(pub $field: Option<String>,)+
        }

        impl $name {
            /// Wire names in signing order
            pub const FIELD_ORDER: &'static [&'static str] = &[$($wire),+];

            /// Set a field by wire name. Returns `false` for names outside the table.
            pub fn set(&mut self, name: &str, value: impl Into<String>) -> bool {
                match name {
                    $($wire => {
                        self.$field = Some(value.into());
                        true
                    })+
                    _ => false,
                }
            }

            /// Build from arbitrary pairs, ignoring names outside the table
            pub fn from_pairs<I, K, V>(pairs: I) -> Self
            where
                I: IntoIterator<Item = (K, V)>,
                K: AsRef<str>,
                V: Into<String>,
            {
                let mut fields = Self::default();
                for (name, value) in pairs {
                    fields.set(name.as_ref(), value);
                }
                fields
            }
        }

        impl OrderedFields for $name {
            fn to_pairs(&self) -> Vec<(&'static str, &str)> {
                let mut pairs = Vec::new();
                $(
                    if let Some(value) = present(&self.$field) {
                        pairs.push(($wire, value));
                    }
                )+
                pairs
            }
        }
    };
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

ordered_fields! {
    /// PayFast form and ITN fields, in PayFast's documented order
    PayFastFields {
        merchant_id => "merchant_id",
        merchant_key => "merchant_key",
        return_url => "return_url",
        cancel_url => "cancel_url",
        notify_url => "notify_url",
        name_first => "name_first",
        name_last => "name_last",
        email_address => "email_address",
        cell_number => "cell_number",
        m_payment_id => "m_payment_id",
        amount => "amount",
        item_name => "item_name",
        item_description => "item_description",
        custom_int1 => "custom_int1",
        custom_int2 => "custom_int2",
        custom_int3 => "custom_int3",
        custom_int4 => "custom_int4",
        custom_int5 => "custom_int5",
        custom_str1 => "custom_str1",
        custom_str2 => "custom_str2",
        custom_str3 => "custom_str3",
        custom_str4 => "custom_str4",
        custom_str5 => "custom_str5",
        email_confirmation => "email_confirmation",
        confirmation_address => "confirmation_address",
        payment_method => "payment_method",
        subscription_type => "subscription_type",
        billing_date => "billing_date",
        recurring_amount => "recurring_amount",
        frequency => "frequency",
        cycles => "cycles",
    }
}

ordered_fields! {
    /// PayWeb3 initiate request fields
    PayGateInitiateFields {
        paygate_id => "PAYGATE_ID",
        reference => "REFERENCE",
        amount => "AMOUNT",
        currency => "CURRENCY",
        return_url => "RETURN_URL",
        transaction_date => "TRANSACTION_DATE",
        locale => "LOCALE",
        country => "COUNTRY",
        email => "EMAIL",
        pay_method => "PAY_METHOD",
        pay_method_detail => "PAY_METHOD_DETAIL",
        notify_url => "NOTIFY_URL",
        user1 => "USER1",
        user2 => "USER2",
        user3 => "USER3",
        vault => "VAULT",
        vault_id => "VAULT_ID",
    }
}

ordered_fields! {
    /// PayWeb3 initiate response fields covered by its checksum
    PayGateResponseFields {
        paygate_id => "PAYGATE_ID",
        pay_request_id => "PAY_REQUEST_ID",
        reference => "REFERENCE",
    }
}

ordered_fields! {
    /// PayWeb3 notify fields
    PayGateNotifyFields {
        paygate_id => "PAYGATE_ID",
        pay_request_id => "PAY_REQUEST_ID",
        reference => "REFERENCE",
        transaction_status => "TRANSACTION_STATUS",
        result_code => "RESULT_CODE",
        auth_code => "AUTH_CODE",
        currency => "CURRENCY",
        amount => "AMOUNT",
        result_desc => "RESULT_DESC",
        transaction_id => "TRANSACTION_ID",
        risk_indicator => "RISK_INDICATOR",
        pay_method => "PAY_METHOD",
        pay_method_detail => "PAY_METHOD_DETAIL",
        user1 => "USER1",
        user2 => "USER2",
        user3 => "USER3",
        vault_id => "VAULT_ID",
        payvault_data_1 => "PAYVAULT_DATA_1",
        payvault_data_2 => "PAYVAULT_DATA_2",
    }
}

// =============================================================================
// Schemes
// =============================================================================

/// Build the key=value parameter string that the PayFast scheme hashes.
pub fn payfast_param_string(
    fields: &PayFastFields,
    passphrase: Option<&str>,
    encoding: SignatureEncoding,
) -> String {
    let mut params: Vec<String> = fields
        .to_pairs()
        .into_iter()
        .map(|(name, value)| format!("{}={}", name, encode_value(value, encoding)))
        .collect();

    if let Some(passphrase) = passphrase.map(str::trim).filter(|p| !p.is_empty()) {
        params.push(format!("passphrase={}", encode_value(passphrase, encoding)));
    }

    params.join("&")
}

/// PayFast key=value signature (also used for PayFast-style PayGate notifications).
pub fn payfast_signature(
    fields: &PayFastFields,
    passphrase: Option<&str>,
    encoding: SignatureEncoding,
) -> String {
    md5_hex(&payfast_param_string(fields, passphrase, encoding))
}

/// Build the parameter string for an inbound ITN.
///
/// Every received field except `signature` takes part, in the order it was
/// posted and including empty values, so fields outside the outbound table
/// (`payment_status`, `pf_payment_id`, ...) are covered too.
pub fn itn_param_string<K, V>(
    pairs: &[(K, V)],
    passphrase: Option<&str>,
    encoding: SignatureEncoding,
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut params: Vec<String> = pairs
        .iter()
        .filter(|(name, _)| name.as_ref() != "signature")
        .map(|(name, value)| format!("{}={}", name.as_ref(), encode_value(value.as_ref(), encoding)))
        .collect();

    if let Some(passphrase) = passphrase.map(str::trim).filter(|p| !p.is_empty()) {
        params.push(format!("passphrase={}", encode_value(passphrase, encoding)));
    }

    params.join("&")
}

/// Signature PayFast puts on an ITN
pub fn itn_signature<K, V>(
    pairs: &[(K, V)],
    passphrase: Option<&str>,
    encoding: SignatureEncoding,
) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    md5_hex(&itn_param_string(pairs, passphrase, encoding))
}

/// PayGate checksum: values concatenated in table order, then the key.
pub fn paygate_checksum<F: OrderedFields>(fields: &F, key: &str) -> String {
    let mut input: String = fields.to_pairs().into_iter().map(|(_, v)| v).collect();
    input.push_str(key);
    md5_hex(&input)
}

/// Peach signature: HMAC-SHA256 over `k=v` pairs sorted by key.
pub fn peach_signature<K, V>(pairs: &[(K, V)], secret: &str) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut sorted: Vec<(&str, &str)> = pairs
        .iter()
        .map(|(k, v)| (k.as_ref(), v.as_ref()))
        .collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let message = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// PayFast hashes with PHP `urlencode`: only alphanumerics and `-_.` stay
/// literal, spaces become `+` and escapes use uppercase hex.
fn encode_value(value: &str, encoding: SignatureEncoding) -> String {
    match encoding {
        SignatureEncoding::Raw => value.to_string(),
        SignatureEncoding::Encoded => urlencoding::encode(value)
            .replace("%20", "+")
            .replace('~', "%7E"),
    }
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

// =============================================================================
// Verification & audit
// =============================================================================

/// Compare a received digest with the expected one in constant time
pub fn signatures_match(received: &str, expected: &str) -> bool {
    constant_time_compare(received.trim(), expected)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Record a computed signature on the `audit` target. Secrets are never logged.
pub fn audit_signature(
    gateway: GatewayKind,
    scheme: &'static str,
    reference: &str,
    fields: &[&str],
    keyed: bool,
    digest: &str,
) {
    info!(
        target: "audit",
        gateway = %gateway,
        scheme,
        reference,
        fields = %fields.join(","),
        keyed,
        digest,
        "signature computed"
    );
}

/// Record a rejected notification on the `audit` target
pub fn audit_mismatch(gateway: GatewayKind, reference: &str, received: &str, expected: &str) {
    warn!(
        target: "audit",
        gateway = %gateway,
        reference,
        received,
        expected,
        "signature mismatch"
    );
}
