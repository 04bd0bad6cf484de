//! # PayGate PayWeb3
//!
//! ```text
//! initiate()                                   PayGate
//!   ├── persist pending record
//!   ├── POST initiate.trans (checksummed) ───────►
//!   │   ◄──────── PAYGATE_ID&PAY_REQUEST_ID&REFERENCE&CHECKSUM
//!   ├── verify response checksum
//!   └── redirect: process.trans?PAY_REQUEST_ID=..&CHECKSUM=..
//! ```
//!
//! Notifications arrive either as PayWeb3 posts (`CHECKSUM`) or as
//! PayFast-style ITNs (`signature`) signed with the PayGate encryption key.

use crate::config::PayGateConfig;
use crate::context::GatewayContext;
use crate::form::decode_form_response;
use crate::payfast::verify_key_value_itn;
use crate::signature::{
    audit_mismatch, audit_signature, paygate_checksum, signatures_match, OrderedFields,
    PayGateInitiateFields, PayGateNotifyFields, PayGateResponseFields,
};
use async_trait::async_trait;
use chrono::Utc;
use pay_core::{
    round_to_cents, Applicant, Checkout, GatewayKind, InitiationRequest, InitiationResult, NotificationFields,
    PaymentError, PaymentGateway, PaymentOutcome, PaymentResult, VerifiedNotification,
};
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::{error, info, instrument};

/// Path PayGate posts notifications to
pub const PAYGATE_NOTIFY_PATH: &str = "/api/paygate/notify";

const LOCALE: &str = "en-za";
const COUNTRY: &str = "ZAF";

/// PayGate PayWeb3 gateway
pub struct PayGateGateway {
    ctx: GatewayContext,
    client: Client,
}

impl PayGateGateway {
    pub fn new(ctx: GatewayContext) -> PaymentResult<Self> {
        let client = ctx.http_client()?;
        Ok(Self { ctx, client })
    }

    fn request_fields(
        &self,
        config: &PayGateConfig,
        reference: &str,
        applicant: &Applicant,
    ) -> PaymentResult<PayGateInitiateFields> {
        let callbacks = &self.ctx.settings.callbacks;

        // PayGate cannot reach a localhost notify URL
        let notify_url = if callbacks.is_local() {
            None
        } else {
            Some(callbacks.url(PAYGATE_NOTIFY_PATH))
        };

        Ok(PayGateInitiateFields {
            paygate_id: Some(config.paygate_id.clone()),
            reference: Some(reference.to_string()),
            amount: Some(amount_in_cents(applicant.amount)?),
            currency: Some(self.ctx.settings.currency.clone()),
            return_url: Some(callbacks.url(&format!(
                "/payment-success.html?ref={}&gateway=paygate",
                reference
            ))),
            transaction_date: Some(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            locale: Some(LOCALE.to_string()),
            country: Some(COUNTRY.to_string()),
            email: Some(applicant.email.clone()),
            notify_url,
            ..Default::default()
        })
    }

    async fn post_initiate(
        &self,
        config: &PayGateConfig,
        reference: &str,
        form: &[(String, String)],
    ) -> PaymentResult<(String, String)> {
        let gateway_error = |message: String| PaymentError::gateway("paygate", reference, message);

        let response = self
            .client
            .post(&config.initiate_url)
            .form(form)
            .send()
            .await
            .map_err(|e| gateway_error(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| gateway_error(e.to_string()))?;

        if !status.is_success() {
            error!("PayGate API error: status={}, body={}", status, body);
            return Err(gateway_error(format!("HTTP {}: {}", status, body)));
        }

        let decoded = decode_form_response(&body)
            .map_err(|e| gateway_error(format!("malformed response: {}", e)))?;

        if let Some(code) = decoded.get("ERROR") {
            error!(reference, code, "PayGate rejected initiation");
            return Err(gateway_error(code.to_string()));
        }

        let pay_request_id = decoded
            .get("PAY_REQUEST_ID")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| gateway_error("response missing PAY_REQUEST_ID".to_string()))?
            .to_string();
        let received = decoded.get("CHECKSUM").unwrap_or_default().to_string();

        let signed = PayGateResponseFields::from_pairs(decoded.pairs().iter().map(|(k, v)| (k, v)));
        let expected = paygate_checksum(&signed, config.encryption_key());
        if !signatures_match(&received, &expected) {
            audit_mismatch(GatewayKind::PayGate, reference, &received, &expected);
            return Err(gateway_error("response checksum mismatch".to_string()));
        }

        Ok((pay_request_id, received))
    }
}

#[async_trait]
impl PaymentGateway for PayGateGateway {
    #[instrument(skip(self, request), fields(gateway = "paygate"))]
    async fn initiate(&self, request: &InitiationRequest) -> PaymentResult<InitiationResult> {
        let applicant = request.validate()?;
        let config = self.ctx.settings.paygate();
        let reference = self.ctx.references.next();

        let fields = self.request_fields(&config, &reference, &applicant)?;
        let checksum = paygate_checksum(&fields, config.encryption_key());
        audit_signature(
            GatewayKind::PayGate,
            "checksum",
            &reference,
            &fields.signed_names(),
            true,
            &checksum,
        );

        let mut form: Vec<(String, String)> = fields
            .to_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        form.push(("CHECKSUM".to_string(), checksum));

        // Persisted before the outbound call so a late notification can match
        self.ctx.persist_pending(&reference, &applicant).await?;

        let (pay_request_id, process_checksum) =
            self.post_initiate(&config, &reference, &form).await?;

        info!(
            reference = %reference,
            pay_request_id = %pay_request_id,
            "PayGate payment initiated"
        );

        Ok(InitiationResult {
            gateway: GatewayKind::PayGate,
            sandbox: config.sandbox,
            checkout: Checkout::Redirect {
                url: format!(
                    "{}?PAY_REQUEST_ID={}&CHECKSUM={}",
                    config.process_url,
                    urlencoding::encode(&pay_request_id),
                    process_checksum
                ),
            },
            gateway_request_id: Some(pay_request_id),
            reference,
        })
    }

    #[instrument(skip(self, fields), fields(gateway = "paygate"))]
    fn verify_notification(
        &self,
        fields: &NotificationFields,
    ) -> PaymentResult<VerifiedNotification> {
        let config = self.ctx.settings.paygate();

        if fields.contains("signature") && !fields.contains("CHECKSUM") {
            return verify_key_value_itn(
                GatewayKind::PayGate,
                fields,
                Some(config.encryption_key()).filter(|k| !k.is_empty()),
                config.encoding,
            );
        }

        let reference = fields.get_non_empty("REFERENCE").unwrap_or_default();
        let received = fields.get("CHECKSUM").unwrap_or_default();

        let signed = PayGateNotifyFields::from_pairs(fields.without("CHECKSUM"));
        let expected = paygate_checksum(&signed, config.encryption_key());
        audit_signature(
            GatewayKind::PayGate,
            "checksum",
            reference,
            &signed.signed_names(),
            true,
            &expected,
        );

        if !signatures_match(received, &expected) {
            audit_mismatch(GatewayKind::PayGate, reference, received, &expected);
            return Err(PaymentError::SignatureMismatch {
                gateway: GatewayKind::PayGate.to_string(),
            });
        }

        if reference.is_empty() {
            return Err(PaymentError::MalformedNotification(
                "REFERENCE missing".to_string(),
            ));
        }

        let status = fields.get("TRANSACTION_STATUS").unwrap_or_default().trim();

        Ok(VerifiedNotification {
            gateway: GatewayKind::PayGate,
            reference: reference.to_string(),
            outcome: map_transaction_status(status),
            payment_id: fields.get_non_empty("TRANSACTION_ID").map(String::from),
            gateway_status: status.to_string(),
        })
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::PayGate
    }
}

/// Map a PayWeb3 `TRANSACTION_STATUS` to an outcome
pub fn map_transaction_status(status: &str) -> Option<PaymentOutcome> {
    match status {
        "1" => Some(PaymentOutcome::Paid),
        "2" => Some(PaymentOutcome::Failed),
        "3" | "4" => Some(PaymentOutcome::Cancelled),
        _ => None,
    }
}

/// Amount in the smallest currency unit, as PayWeb3 expects
fn amount_in_cents(amount: Decimal) -> PaymentResult<String> {
    round_to_cents(amount)
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|cents| cents.trunc().to_string())
        .ok_or_else(|| PaymentError::Validation(format!("amount {} is out of range", amount)))
}
