//! # Request Handlers
//!
//! Axum request handlers for payment initiation, gateway notifications and
//! status lookups.

use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pay_core::{GatewayKind, InitiationRequest, InitiationResult, PaymentError, PaymentRecord};
use serde::{ser::SerializeMap, Serialize, Serializer};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Initiation response, shared by all three gateways
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiationResponse {
    pub success: bool,
    /// Form target (PayFast) or redirect URL (PayGate, Peach)
    pub payment_url: String,
    /// Signed fields the client posts to `payment_url`
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_form_data"
    )]
    pub form_data: Option<Vec<(String, String)>>,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pay_request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_id: Option<String>,
    pub gateway: GatewayKind,
    pub sandbox: bool,
}

impl From<InitiationResult> for InitiationResponse {
    fn from(result: InitiationResult) -> Self {
        let payment_url = result.payment_url().to_string();
        let form_data = result.form_fields().map(<[_]>::to_vec);
        let (pay_request_id, checkout_id) = match result.gateway {
            GatewayKind::PayGate => (result.gateway_request_id, None),
            GatewayKind::Peach => (None, result.gateway_request_id),
            GatewayKind::PayFast => (None, None),
        };

        Self {
            success: true,
            payment_url,
            form_data,
            reference: result.reference,
            pay_request_id,
            checkout_id,
            gateway: result.gateway,
            sandbox: result.sandbox,
        }
    }
}

/// Writes form fields as a JSON object in signing order
fn serialize_form_data<S>(
    fields: &Option<Vec<(String, String)>>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let fields = fields.as_deref().unwrap_or_default();
    let mut map = serializer.serialize_map(Some(fields.len()))?;
    for (name, value) in fields {
        map.serialize_entry(name, value)?;
    }
    map.end()
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Pending record left behind by a failed initiation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
            reference: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn payment_error_to_response(err: PaymentError) -> ApiError {
    let code = err.status_code();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let response = match &err {
        PaymentError::Validation(message) => ErrorResponse::new(message.clone(), code),
        PaymentError::GatewayCommunication {
            gateway,
            reference,
            message,
        } => ErrorResponse::new(format!("Payment initiation failed at {}", gateway), code)
            .with_details(message.clone())
            .with_reference(reference.clone()),
        PaymentError::RecordNotFound { .. } => ErrorResponse::new("Payment not found", code),
        PaymentError::Configuration(_) | PaymentError::Store(_) | PaymentError::Internal(_) => {
            ErrorResponse::new("Payment service unavailable", code).with_details(err.to_string())
        }
        _ => ErrorResponse::new(err.to_string(), code),
    };

    (status, Json(response))
}

// =============================================================================
// Initiation
// =============================================================================

/// Start a PayFast payment
#[instrument(skip(state, body))]
pub async fn start_payment(
    State(state): State<AppState>,
    body: Result<Json<InitiationRequest>, JsonRejection>,
) -> Result<Json<InitiationResponse>, ApiError> {
    initiate(&state, GatewayKind::PayFast, body).await
}

/// Start a PayGate payment
#[instrument(skip(state, body))]
pub async fn paygate_initiate(
    State(state): State<AppState>,
    body: Result<Json<InitiationRequest>, JsonRejection>,
) -> Result<Json<InitiationResponse>, ApiError> {
    initiate(&state, GatewayKind::PayGate, body).await
}

/// Start a Peach Payments checkout
#[instrument(skip(state, body))]
pub async fn peach_initiate(
    State(state): State<AppState>,
    body: Result<Json<InitiationRequest>, JsonRejection>,
) -> Result<Json<InitiationResponse>, ApiError> {
    initiate(&state, GatewayKind::Peach, body).await
}

async fn initiate(
    state: &AppState,
    kind: GatewayKind,
    body: Result<Json<InitiationRequest>, JsonRejection>,
) -> Result<Json<InitiationResponse>, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid request body", 400).with_details(rejection.body_text())),
        )
    })?;

    let gateway = state.registry.get(kind).ok_or_else(|| {
        payment_error_to_response(PaymentError::Configuration(format!(
            "gateway '{}' is not registered",
            kind
        )))
    })?;

    let result = gateway.initiate(&request).await.map_err(|e| {
        match &e {
            PaymentError::Validation(_) => warn!(gateway = %kind, "rejected initiation: {}", e),
            _ => error!(gateway = %kind, "payment initiation failed: {}", e),
        }
        payment_error_to_response(e)
    })?;

    info!(
        gateway = %kind,
        reference = %result.reference,
        sandbox = result.sandbox,
        "payment initiated"
    );

    Ok(Json(result.into()))
}

// =============================================================================
// Notifications
// =============================================================================

/// PayFast ITN
#[instrument(skip(state, body))]
pub async fn payfast_verify(State(state): State<AppState>, body: Bytes) -> Response {
    notify(&state, GatewayKind::PayFast, &body).await
}

/// PayGate notification
#[instrument(skip(state, body))]
pub async fn paygate_notify(State(state): State<AppState>, body: Bytes) -> Response {
    notify(&state, GatewayKind::PayGate, &body).await
}

/// Peach Payments webhook
#[instrument(skip(state, body))]
pub async fn peach_webhook(State(state): State<AppState>, body: Bytes) -> Response {
    notify(&state, GatewayKind::Peach, &body).await
}

async fn notify(state: &AppState, kind: GatewayKind, body: &[u8]) -> Response {
    match state.reconciler.reconcile(kind, body).await {
        Ok(ack) => (StatusCode::OK, ack.token).into_response(),
        Err(PaymentError::SignatureMismatch { .. }) => {
            (StatusCode::BAD_REQUEST, "Invalid signature").into_response()
        }
        Err(e) => {
            error!(gateway = %kind, "notification rejected: {}", e);
            payment_error_to_response(e).into_response()
        }
    }
}

// =============================================================================
// Status
// =============================================================================

/// Current state of a payment
#[instrument(skip(state))]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let record = state
        .store
        .get(&reference)
        .await
        .map_err(payment_error_to_response)?
        .ok_or_else(|| payment_error_to_response(PaymentError::RecordNotFound { reference }))?;

    Ok(Json(record))
}
