//! # Peach Payments
//!
//! COPYandPAY checkout: the adapter creates a checkout server-to-server and
//! hands the client the payment widget URL for the returned checkout id.
//! Requests and webhooks are signed with a sorted-key HMAC-SHA256 keyed by
//! the access token.

use crate::config::PeachConfig;
use crate::context::GatewayContext;
use crate::signature::{audit_mismatch, audit_signature, peach_signature, signatures_match};
use async_trait::async_trait;
use pay_core::{
    Checkout, GatewayKind, InitiationRequest, InitiationResult, NotificationFields,
    PaymentError, PaymentGateway, PaymentOutcome, PaymentResult, VerifiedNotification,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info, instrument};

/// Path Peach posts webhooks to
pub const PEACH_NOTIFY_PATH: &str = "/api/peach/webhook";

/// Debit: authorize and capture in one step
const PAYMENT_TYPE: &str = "DB";

/// Sent when the applicant did not give an ISO 3166 alpha-2 code
const DEFAULT_BILLING_COUNTRY: &str = "ZA";

/// Peach Payments COPYandPAY gateway
pub struct PeachGateway {
    ctx: GatewayContext,
    client: Client,
}

impl PeachGateway {
    pub fn new(ctx: GatewayContext) -> PaymentResult<Self> {
        let client = ctx.http_client()?;
        Ok(Self { ctx, client })
    }

    async fn create_checkout(
        &self,
        config: &PeachConfig,
        reference: &str,
        form: &[(String, String)],
    ) -> PaymentResult<String> {
        let gateway_error = |message: String| PaymentError::gateway("peach", reference, message);

        let response = self
            .client
            .post(config.checkouts_url())
            .header("Authorization", config.auth_header())
            .form(form)
            .send()
            .await
            .map_err(|e| gateway_error(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| gateway_error(e.to_string()))?;

        let parsed = serde_json::from_str::<PeachCheckoutResponse>(&body);

        if !status.is_success() {
            error!("Peach API error: status={}, body={}", status, body);
            let detail = parsed
                .ok()
                .and_then(|r| r.result)
                .map(|r| r.describe())
                .unwrap_or_else(|| format!("HTTP {}: {}", status, body));
            return Err(gateway_error(detail));
        }

        let checkout = parsed.map_err(|e| {
            gateway_error(format!("Failed to parse Peach response: {}", e))
        })?;

        if let Some(result) = &checkout.result {
            if !result.code.starts_with("000.") {
                error!(reference, code = %result.code, "Peach rejected checkout");
                return Err(gateway_error(result.describe()));
            }
        }

        checkout
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| gateway_error("response missing checkout id".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PeachGateway {
    #[instrument(skip(self, request), fields(gateway = "peach"))]
    async fn initiate(&self, request: &InitiationRequest) -> PaymentResult<InitiationResult> {
        let applicant = request.validate()?;
        let config = self.ctx.settings.peach()?;
        let callbacks = &self.ctx.settings.callbacks;
        let reference = self.ctx.references.next();
        let (given_name, surname) = applicant.split_name();

        let mut form: Vec<(String, String)> = vec![
            ("entityId".to_string(), config.entity_id.clone()),
            ("amount".to_string(), applicant.amount_2dp()),
            ("currency".to_string(), self.ctx.settings.currency.clone()),
            ("paymentType".to_string(), PAYMENT_TYPE.to_string()),
            ("merchantTransactionId".to_string(), reference.clone()),
            ("customer.email".to_string(), applicant.email.clone()),
            ("customer.givenName".to_string(), given_name),
            ("customer.surname".to_string(), surname),
            (
                "billing.country".to_string(),
                billing_country(applicant.country.as_deref()),
            ),
        ];
        form.push((
            "shopperResultUrl".to_string(),
            callbacks.url(&format!(
                "/payment-success.html?ref={}&gateway=peach",
                reference
            )),
        ));
        form.push((
            "notificationUrl".to_string(),
            callbacks.url(PEACH_NOTIFY_PATH),
        ));

        let signature = peach_signature(&form, config.access_token());
        audit_signature(
            GatewayKind::Peach,
            "sorted_hmac",
            &reference,
            &field_names(&form),
            true,
            &signature,
        );
        form.push(("signature".to_string(), signature));

        // Persisted before the outbound call so a late webhook can match
        self.ctx.persist_pending(&reference, &applicant).await?;

        let checkout_id = self.create_checkout(&config, &reference, &form).await?;

        info!(
            reference = %reference,
            checkout_id = %checkout_id,
            "Peach checkout created"
        );

        Ok(InitiationResult {
            gateway: GatewayKind::Peach,
            sandbox: config.test_mode,
            checkout: Checkout::Redirect {
                url: config.widget_url(&checkout_id),
            },
            gateway_request_id: Some(checkout_id),
            reference,
        })
    }

    #[instrument(skip(self, fields), fields(gateway = "peach"))]
    fn verify_notification(
        &self,
        fields: &NotificationFields,
    ) -> PaymentResult<VerifiedNotification> {
        let config = self.ctx.settings.peach()?;

        let reference = fields
            .get_non_empty("merchantTransactionId")
            .unwrap_or_default();
        let received = fields.get("signature").unwrap_or_default();

        let signed = fields.without("signature");
        let expected = peach_signature(&signed, config.access_token());
        audit_signature(
            GatewayKind::Peach,
            "sorted_hmac",
            reference,
            &field_names(&signed),
            true,
            &expected,
        );

        if !signatures_match(received, &expected) {
            audit_mismatch(GatewayKind::Peach, reference, received, &expected);
            return Err(PaymentError::SignatureMismatch {
                gateway: GatewayKind::Peach.to_string(),
            });
        }

        if reference.is_empty() {
            return Err(PaymentError::MalformedNotification(
                "merchantTransactionId missing".to_string(),
            ));
        }

        let code = fields.get("result.code").unwrap_or_default().trim();
        let payment_id = fields
            .get_non_empty("id")
            .or_else(|| fields.get_non_empty("checkoutId"))
            .map(String::from);

        Ok(VerifiedNotification {
            gateway: GatewayKind::Peach,
            reference: reference.to_string(),
            outcome: map_result_code(code),
            payment_id,
            gateway_status: code.to_string(),
        })
    }

    fn kind(&self) -> GatewayKind {
        GatewayKind::Peach
    }
}

fn field_names(pairs: &[(String, String)]) -> Vec<&str> {
    let mut names: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    names.sort_unstable();
    names
}

/// Map a Peach `result.code` to an outcome.
///
/// `000.000.*` and `000.100.*` are successful; `000.200.*` and `800.*` mean
/// the transaction is still pending. The shopper-cancelled code maps to
/// cancelled and every other code is a failure.
pub fn map_result_code(code: &str) -> Option<PaymentOutcome> {
    if code.is_empty() {
        return None;
    }
    if code.starts_with("000.000") || code.starts_with("000.100") {
        return Some(PaymentOutcome::Paid);
    }
    if code.starts_with("000.200") || code.starts_with("800.") {
        return None;
    }
    if code == "100.396.101" {
        return Some(PaymentOutcome::Cancelled);
    }
    Some(PaymentOutcome::Failed)
}

// =============================================================================
// Peach API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct PeachCheckoutResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Option<PeachResult>,
}

#[derive(Debug, Deserialize)]
struct PeachResult {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

impl PeachResult {
    fn describe(&self) -> String {
        match &self.description {
            Some(description) => format!("{}: {}", self.code, description),
            None => self.code.clone(),
        }
    }
}

/// Peach only accepts two-letter country codes; free text falls back to ZA
fn billing_country(country: Option<&str>) -> String {
    match country.map(str::trim) {
        Some(code) if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) => {
            code.to_ascii_uppercase()
        }
        _ => DEFAULT_BILLING_COUNTRY.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewaySettings;
    use pay_core::{CallbackUrls, InMemoryPaymentStore, PaymentStatus, PaymentStore};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TOKEN: &str = "OGE4Mjk0MTc0YjdlY2IyODAxNGI5Njk5MjIwMDE1Y2N8c3k2S0pzVDg=";

    fn settings(server_uri: &str) -> GatewaySettings {
        GatewaySettings::default()
            .with_callbacks(CallbackUrls::new("https://visa.example.com"))
            .with_peach_credentials("8a8294174b7ecb28014b9699220015ca", TOKEN)
            .with_peach_url(server_uri)
    }

    fn gateway(settings: GatewaySettings) -> (PeachGateway, Arc<InMemoryPaymentStore>) {
        let store = Arc::new(InMemoryPaymentStore::new());
        let ctx = GatewayContext::new(settings, store.clone());
        (PeachGateway::new(ctx).unwrap(), store)
    }

    fn request() -> InitiationRequest {
        InitiationRequest::new("APP-12", "Thandi", "thandi@example.com", dec!(350))
            .with_country("South Africa")
    }

    #[tokio::test]
    async fn test_initiate_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkouts"))
            .and(header("Authorization", format!("Bearer {}", TOKEN).as_str()))
            .and(body_string_contains("paymentType=DB"))
            .and(body_string_contains("amount=350.00"))
            .and(body_string_contains("customer.givenName=Thandi"))
            .and(body_string_contains("customer.surname=Thandi"))
            .and(body_string_contains("billing.country=ZA"))
            .and(body_string_contains("signature="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": {"code": "000.200.100", "description": "successfully created checkout"},
                "id": "CHK.123"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (gateway, store) = gateway(settings(&server.uri()));
        let result = gateway.initiate(&request()).await.unwrap();

        assert_eq!(result.gateway_request_id.as_deref(), Some("CHK.123"));
        assert_eq!(
            result.payment_url(),
            format!("{}/v1/paymentWidgets.js?checkoutId=CHK.123", server.uri())
        );
        assert!(result.sandbox);
        let record = store.get(&result.reference).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[test]
    fn test_billing_country() {
        assert_eq!(billing_country(Some("South Africa")), "ZA");
        assert_eq!(billing_country(Some(" ae ")), "AE");
        assert_eq!(billing_country(Some("ZAF")), "ZA");
        assert_eq!(billing_country(Some("Z1")), "ZA");
        assert_eq!(billing_country(None), "ZA");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_anything() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let settings = GatewaySettings::default().with_peach_url(server.uri());
        let (gateway, store) = gateway(settings);

        let err = gateway.initiate(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_rejected_checkout_keeps_pending_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "result": {"code": "200.300.404", "description": "invalid or missing parameter"}
            })))
            .mount(&server)
            .await;

        let (gateway, store) = gateway(settings(&server.uri()));
        let err = gateway.initiate(&request()).await.unwrap_err();

        match &err {
            PaymentError::GatewayCommunication { message, .. } => {
                assert_eq!(message, "200.300.404: invalid or missing parameter")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let reference = err.pending_reference().unwrap();
        let record = store.get(reference).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_timeout_is_gateway_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "late"}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let settings = settings(&server.uri()).with_timeout(Duration::from_millis(50));
        let (gateway, _) = gateway(settings);

        let err = gateway.initiate(&request()).await.unwrap_err();
        assert!(matches!(err, PaymentError::GatewayCommunication { .. }));
    }

    fn webhook(reference: &str, code: &str) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("id".to_string(), "8ac7a4a0".to_string()),
            ("checkoutId".to_string(), "CHK.123".to_string()),
            ("merchantTransactionId".to_string(), reference.to_string()),
            ("result.code".to_string(), code.to_string()),
            ("amount".to_string(), "350.00".to_string()),
        ];
        let signature = peach_signature(&pairs, TOKEN);
        pairs.push(("signature".to_string(), signature));
        pairs
    }

    #[test]
    fn test_verify_webhook() {
        let (gateway, _) = gateway(settings("http://unused"));
        let fields = NotificationFields::from_pairs(webhook("UAE-PAY-5", "000.000.000")).unwrap();

        let verified = gateway.verify_notification(&fields).unwrap();
        assert_eq!(verified.reference, "UAE-PAY-5");
        assert_eq!(verified.outcome, Some(PaymentOutcome::Paid));
        assert_eq!(verified.payment_id.as_deref(), Some("8ac7a4a0"));
    }

    #[test]
    fn test_verify_webhook_tampered() {
        let (gateway, _) = gateway(settings("http://unused"));
        let mut pairs = webhook("UAE-PAY-5", "800.100.151");
        pairs[3].1 = "000.000.000".to_string();

        let fields = NotificationFields::from_pairs(pairs).unwrap();
        assert!(matches!(
            gateway.verify_notification(&fields),
            Err(PaymentError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_result_code_mapping() {
        assert_eq!(map_result_code("000.000.000"), Some(PaymentOutcome::Paid));
        assert_eq!(map_result_code("000.100.110"), Some(PaymentOutcome::Paid));
        assert_eq!(map_result_code("000.200.000"), None);
        assert_eq!(map_result_code("800.400.500"), None);
        assert_eq!(map_result_code("100.396.101"), Some(PaymentOutcome::Cancelled));
        assert!(map_result_code("800.100.151").is_none());
        assert_eq!(map_result_code("100.100.101"), Some(PaymentOutcome::Failed));
        assert_eq!(map_result_code(""), None);
    }
}
