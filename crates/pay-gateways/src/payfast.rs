//! # PayFast
//!
//! PayFast has no server-to-server initiation call. The adapter signs the
//! full form and the client auto-submits it to the PayFast process URL.
//! PayFast then reports the outcome as an ITN posted to
//! `/api/payments/verify`.

use crate::config::SignatureEncoding;
use crate::context::GatewayContext;
use crate::signature::{
    audit_mismatch, audit_signature, itn_signature, payfast_signature, signatures_match,
    OrderedFields, PayFastFields,
};
use async_trait::async_trait;
use pay_core::{
    Checkout, GatewayKind, InitiationRequest, InitiationResult, NotificationFields,
    PaymentError, PaymentGateway, PaymentOutcome, PaymentResult, VerifiedNotification,
};
use tracing::{info, instrument};

/// Path PayFast posts ITNs to
pub const PAYFAST_NOTIFY_PATH: &str = "/api/payments/verify";

/// PayFast form-post gateway
pub struct PayFastGateway {
    ctx: GatewayContext,
}

impl PayFastGateway {
    pub fn new(ctx: GatewayContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl PaymentGateway for PayFastGateway {
    #[instrument(skip(self, request), fields(gateway = "payfast"))]
    async fn initiate(&self, request: &InitiationRequest) -> PaymentResult<InitiationResult> {
        let applicant = request.validate()?;
        let config = self.ctx.settings.payfast();
        let callbacks = &self.ctx.settings.callbacks;
        let reference = self.ctx.references.next();
        let (name_first, name_last) = applicant.split_name();

        let fields = PayFastFields {
            merchant_id: Some(config.merchant_id.clone()),
            merchant_key: Some(config.merchant_key.clone()),
            return_url: Some(callbacks.url(&format!("/payment-success.html?ref={}", reference))),
            cancel_url: Some(callbacks.url(&format!(
                "/payment.html?ref={}",
                urlencoding::encode(&applicant.application_id)
            ))),
            notify_url: Some(callbacks.url(PAYFAST_NOTIFY_PATH)),
            name_first: Some(name_first),
            name_last: Some(name_last),
            email_address: Some(applicant.email.clone()),
            m_payment_id: Some(reference.clone()),
            amount: Some(applicant.amount_2dp()),
            item_name: Some(applicant.description.clone()),
            item_description: Some(format!(
                "{} - {}",
                applicant.description, applicant.application_id
            )),
            custom_str1: Some(applicant.application_id.clone()),
            custom_str2: Some(
                applicant
                    .country
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            ..Default::default()
        };

        let passphrase = config.passphrase();
        let signature = payfast_signature(&fields, passphrase, config.encoding);
        audit_signature(
            GatewayKind::PayFast,
            scheme_name(config.encoding),
            &reference,
            &fields.signed_names(),
            passphrase.is_some(),
            &signature,
        );

        self.ctx.persist_pending(&reference, &applicant).await?;

        let mut form: Vec<(String, String)> = fields
            .to_pairs()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        form.push(("signature".to_string(), signature));

        info!(
            reference = %reference,
            amount = %applicant.amount_2dp(),
            sandbox = config.sandbox,
            "PayFast payment initiated"
        );

        Ok(InitiationResult {
            reference,
            gateway: GatewayKind::PayFast,
            sandbox: config.sandbox,
            checkout: Checkout::FormPost {
                action_url: config.process_url,
                fields: form,
            },
            gateway_request_id: None,
        })
    }

    #[instrument(skip(self, fields), fields(gateway = "payfast"))]
    fn verify_notification(
        &self,
        fields: &NotificationFields,
    ) -> PaymentResult<VerifiedNotification> {
        let config = self.ctx.settings.payfast();
        verify_key_value_itn(
            GatewayKind::PayFast,
            fields,
            config.passphrase(),
            config.encoding,
        )
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::PayFast
    }
}

/// Verify an ITN signed with the key=value scheme.
///
/// The signature covers every posted field in posted order, so the signed
/// checkout form handed to the browser cannot be replayed as an ITN.
/// Shared by PayFast and PayFast-style PayGate notifications.
pub(crate) fn verify_key_value_itn(
    gateway: GatewayKind,
    fields: &NotificationFields,
    passphrase: Option<&str>,
    encoding: SignatureEncoding,
) -> PaymentResult<VerifiedNotification> {
    let reference = fields.get_non_empty("m_payment_id").unwrap_or_default();
    let received = fields.get("signature").unwrap_or_default();

    let signed = fields.without("signature");
    let expected = itn_signature(&signed, passphrase, encoding);
    let names: Vec<&str> = signed.iter().map(|(name, _)| name.as_str()).collect();
    audit_signature(
        gateway,
        itn_scheme_name(encoding),
        reference,
        &names,
        passphrase.is_some(),
        &expected,
    );

    if !signatures_match(received, &expected) {
        audit_mismatch(gateway, reference, received, &expected);
        return Err(PaymentError::SignatureMismatch {
            gateway: gateway.to_string(),
        });
    }

    if reference.is_empty() {
        return Err(PaymentError::MalformedNotification(
            "m_payment_id missing".to_string(),
        ));
    }

    let status = fields.get("payment_status").unwrap_or_default().trim();

    Ok(VerifiedNotification {
        gateway,
        reference: reference.to_string(),
        outcome: map_payment_status(status),
        payment_id: fields.get_non_empty("pf_payment_id").map(String::from),
        gateway_status: status.to_string(),
    })
}

/// Map an ITN `payment_status` to an outcome
pub fn map_payment_status(status: &str) -> Option<PaymentOutcome> {
    match status.to_ascii_uppercase().as_str() {
        "COMPLETE" => Some(PaymentOutcome::Paid),
        "FAILED" => Some(PaymentOutcome::Failed),
        "CANCELLED" => Some(PaymentOutcome::Cancelled),
        _ => None,
    }
}

fn scheme_name(encoding: SignatureEncoding) -> &'static str {
    match encoding {
        SignatureEncoding::Raw => "key_value_raw",
        SignatureEncoding::Encoded => "key_value_encoded",
    }
}

fn itn_scheme_name(encoding: SignatureEncoding) -> &'static str {
    match encoding {
        SignatureEncoding::Raw => "itn_key_value_raw",
        SignatureEncoding::Encoded => "itn_key_value_encoded",
    }
}
