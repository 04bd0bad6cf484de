//! # Routes
//!
//! Axum router configuration for the payment API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the main application router
///
/// Routes:
/// - PayFast:
///   - POST /api/payments/start - Signed checkout form
///   - POST /api/payments/verify - ITN
///   - GET  /api/payments/status/{reference} - Payment record
///
/// - PayGate:
///   - POST /api/paygate/initiate - PayWeb3 initiation and redirect
///   - POST /api/paygate/notify - Notification
///
/// - Peach Payments:
///   - POST /api/peach/initiate - Checkout and widget redirect
///   - POST /api/peach/webhook - Notification
pub fn create_router(state: AppState) -> Router {
    let payment_routes = Router::new()
        .route("/start", post(handlers::start_payment))
        .route("/verify", post(handlers::payfast_verify))
        .route("/status/{reference}", get(handlers::payment_status));

    let paygate_routes = Router::new()
        .route("/initiate", post(handlers::paygate_initiate))
        .route("/notify", post(handlers::paygate_notify));

    let peach_routes = Router::new()
        .route("/initiate", post(handlers::peach_initiate))
        .route("/webhook", post(handlers::peach_webhook));

    Router::new()
        .nest("/api/payments", payment_routes)
        .nest("/api/paygate", paygate_routes)
        .nest("/api/peach", peach_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use pay_core::{InMemoryPaymentStore, PaymentStatus, PaymentStore};
    use pay_gateways::{itn_signature, GatewaySettings, SignatureEncoding};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<InMemoryPaymentStore>) {
        app_with(GatewaySettings::default())
    }

    fn app_with(settings: GatewaySettings) -> (Router, Arc<InMemoryPaymentStore>) {
        let store = Arc::new(InMemoryPaymentStore::new());
        let state = AppState::from_parts(
            settings,
            store.clone(),
            AppConfig::from_lookup(|_| None),
        )
        .unwrap();
        (create_router(state), store)
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_post(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    fn applicant() -> Value {
        json!({
            "application_id": "APP-2024-001",
            "applicant_name": "John  Smith",
            "applicant_email": "john@example.com",
            "amount": "350",
            "country": "South Africa"
        })
    }

    fn itn_body(reference: &str, status: &str) -> String {
        let pairs = vec![
            ("m_payment_id", reference),
            ("pf_payment_id", "1089250"),
            ("payment_status", status),
            ("item_name", "UAE Visa Application Fee"),
            ("amount", "350.00"),
        ];
        let signature = itn_signature(
            &pairs,
            Some("jt7NOE43FZPn"),
            SignatureEncoding::Encoded,
        );
        let mut all = pairs;
        all.push(("signature", signature.as_str()));
        serde_urlencoded::to_string(&all).unwrap()
    }

    async fn start(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(json_post("/api/payments/start", applicant()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        body["reference"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_start_payment_returns_signed_form() {
        let (app, store) = app();

        let response = app
            .oneshot(json_post("/api/payments/start", applicant()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["gateway"], "payfast");
        assert_eq!(body["sandbox"], true);
        assert_eq!(body["paymentUrl"], "https://sandbox.payfast.co.za/eng/process");
        assert_eq!(body["formData"]["amount"], "350.00");
        assert_eq!(body["formData"]["name_first"], "John");
        assert_eq!(body["formData"]["name_last"], "Smith");
        assert_eq!(body["formData"]["signature"].as_str().unwrap().len(), 32);

        let reference = body["reference"].as_str().unwrap();
        assert!(reference.starts_with("UAE-PAY-"));
        assert_eq!(body["formData"]["m_payment_id"], reference);

        let record = store.get(reference).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_start_payment_missing_fields() {
        let (app, store) = app();

        let response = app
            .oneshot(json_post(
                "/api/payments/start",
                json!({ "application_id": "APP-1", "amount": 350 }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], 400);
        assert!(body["error"].as_str().unwrap().contains("applicant_name"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_start_payment_malformed_json() {
        let (app, _) = app();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/payments/start")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Invalid request body");
    }

    #[tokio::test]
    async fn test_status_of_pending_payment() {
        let (app, _) = app();
        let reference = start(&app).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/payments/status/{}", reference))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reference"], reference.as_str());
        assert_eq!(body["status"], "pending");
        assert_eq!(body["amount"], 350.0);
        assert_eq!(body["name"], "John Smith");
    }

    #[tokio::test]
    async fn test_status_unknown_reference() {
        let (app, _) = app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/payments/status/UAE-PAY-0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Payment not found");
    }

    #[tokio::test]
    async fn test_itn_marks_payment_paid() {
        let (app, store) = app();
        let reference = start(&app).await;

        let response = app
            .clone()
            .oneshot(form_post(
                "/api/payments/verify",
                itn_body(&reference, "COMPLETE"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"OK");
        let record = store.get(&reference).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(record.payment_id.as_deref(), Some("1089250"));
    }

    #[tokio::test]
    async fn test_itn_with_bad_signature_rejected() {
        let (app, store) = app();
        let reference = start(&app).await;
        let body = itn_body(&reference, "COMPLETE").replace("amount=350.00", "amount=1.00");

        let response = app
            .oneshot(form_post("/api/payments/verify", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_bytes(response).await, b"Invalid signature");
        let record = store.get(&reference).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_checkout_form_replayed_as_itn_rejected() {
        let (app, store) = app();

        let response = app
            .clone()
            .oneshot(json_post("/api/payments/start", applicant()))
            .await
            .unwrap();
        let body = body_json(response).await;
        let reference = body["reference"].as_str().unwrap().to_string();

        let mut replay: Vec<(String, String)> = body["formData"]
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
            .collect();
        replay.push(("payment_status".to_string(), "COMPLETE".to_string()));
        replay.push(("pf_payment_id".to_string(), "forged".to_string()));

        let response = app
            .oneshot(form_post(
                "/api/payments/verify",
                serde_urlencoded::to_string(&replay).unwrap(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_bytes(response).await, b"Invalid signature");
        let record = store.get(&reference).await.unwrap().unwrap();
        assert_eq!(record.status, PaymentStatus::Pending);
        assert!(record.payment_id.is_none());
    }

    #[tokio::test]
    async fn test_peach_webhook_without_signature_rejected() {
        let (app, _) = app_with(
            GatewaySettings::default().with_peach_credentials("8ac7a4c8", "peach-token"),
        );

        let response = app
            .oneshot(form_post(
                "/api/peach/webhook",
                "merchantTransactionId=UAE-PAY-1&result.code=000.100.110".to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_bytes(response).await, b"Invalid signature");
    }

    #[tokio::test]
    async fn test_peach_initiate_without_credentials() {
        let (app, store) = app();

        let response = app
            .oneshot(json_post("/api/peach/initiate", applicant()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], 500);
        assert!(body.get("reference").is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/ozow/initiate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
