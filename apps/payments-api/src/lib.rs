//! # Bookpay Payments API
//!
//! HTTP surface over [`bookpay_payments::PaymentService`].
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Payments API                                 │
//! │                                                                         │
//! │  POST /api/payments/initialize     ──► PaymentService::initialize       │
//! │  GET  /api/payments/verify         ──► PaymentService::verify           │
//! │  POST /api/webhooks/paystack       ──► handle_webhook(Paystack)         │
//! │  POST /api/webhooks/flutterwave    ──► handle_webhook(Flutterwave)      │
//! │  GET  /health                      ──► Database::health_check           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Webhook routes take the raw body so the signature is checked over the
//! exact bytes the provider signed.

pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use bookpay_payments::PaymentService;

pub use error::{ApiError, ErrorCode};

/// Shared state for every handler.
#[derive(Debug)]
pub struct AppState {
    pub payments: PaymentService,
}

impl AppState {
    pub fn new(payments: PaymentService) -> Arc<Self> {
        Arc::new(AppState { payments })
    }
}

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/payments/initialize", post(routes::initialize))
        .route("/api/payments/verify", get(routes::verify))
        .route("/api/webhooks/paystack", post(routes::paystack_webhook))
        .route("/api/webhooks/flutterwave", post(routes::flutterwave_webhook))
        .route("/health", get(routes::health))
        .with_state(state)
}
