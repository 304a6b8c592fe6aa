//! # Route Handlers
//!
//! Each handler parses the request, calls one `PaymentService` entry point
//! and maps the outcome onto a status code.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use bookpay_core::GatewayName;
use bookpay_payments::{InitializeRequest, InitializeResponse, VerificationResult, WebhookAck};

use crate::error::ApiError;
use crate::AppState;

/// Header Paystack signs webhooks with.
pub const PAYSTACK_SIGNATURE_HEADER: &str = "x-paystack-signature";

/// Header Flutterwave signs webhooks with.
pub const FLUTTERWAVE_SIGNATURE_HEADER: &str = "flutterwave-signature";

// =============================================================================
// Payments
// =============================================================================

/// `POST /api/payments/initialize`
pub async fn initialize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InitializeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InitializeResponse>), ApiError> {
    let Json(request) = payload?;
    let response = state.payments.initialize(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Query string of the storefront's return page.
///
/// Providers redirect back with the reference under different names.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub trxref: Option<String>,
    #[serde(default)]
    pub tx_ref: Option<String>,
}

impl VerifyQuery {
    fn reference(&self) -> &str {
        self.reference
            .as_deref()
            .or(self.trxref.as_deref())
            .or(self.tx_ref.as_deref())
            .unwrap_or_default()
    }
}

/// `GET /api/payments/verify?tenant_id=..&reference=..`
pub async fn verify(
    State(state): State<Arc<AppState>>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<Json<VerificationResult>, ApiError> {
    let Query(query) = query?;
    let tenant_id = query.tenant_id.as_deref().unwrap_or_default();
    let result = state.payments.verify(tenant_id, query.reference()).await?;
    Ok(Json(result))
}

// =============================================================================
// Webhooks
// =============================================================================

/// `POST /api/webhooks/paystack`
pub async fn paystack_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    webhook(&state, GatewayName::Paystack, PAYSTACK_SIGNATURE_HEADER, &headers, &body).await
}

/// `POST /api/webhooks/flutterwave`
pub async fn flutterwave_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    webhook(&state, GatewayName::Flutterwave, FLUTTERWAVE_SIGNATURE_HEADER, &headers, &body).await
}

async fn webhook(
    state: &AppState,
    gateway: GatewayName,
    header: &str,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Json<WebhookAck>, ApiError> {
    let signature = headers.get(header).and_then(|v| v.to_str().ok());
    let ack = state.payments.handle_webhook(gateway, body, signature).await?;
    debug!(%gateway, disposition = ?ack.disposition, "Webhook acknowledged");
    Ok(Json(ack))
}

// =============================================================================
// Health
// =============================================================================

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    if state.payments.db().health_check().await {
        (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
            .into_response()
    }
}
