//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Payments API                       │
//! │                                                                         │
//! │  Handler ── Result<T, ApiError>                                         │
//! │                 ▲                                                       │
//! │                 │ From<PaymentError>  (by ErrorKind)                    │
//! │                 │ From<JsonRejection> / From<QueryRejection>            │
//! │                                                                         │
//! │  ErrorKind        Status   code                                         │
//! │  ─────────        ──────   ────                                         │
//! │  Validation       400      VALIDATION_ERROR                             │
//! │  Unauthorized     401      INVALID_SIGNATURE                            │
//! │  NotFound         404      NOT_FOUND                                    │
//! │  Conflict         409      CONFLICT                                     │
//! │  Upstream         502      GATEWAY_ERROR                                │
//! │  Configuration    500      CONFIGURATION_ERROR                          │
//! │  Internal         500      INTERNAL                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Response body:
//! ```json
//! { "code": "CONFLICT", "message": "Time slot is already booked" }
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use bookpay_payments::{ErrorKind, PaymentError};

/// Error returned from every handler.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Webhook signature missing or wrong (401)
    InvalidSignature,

    /// Resource not found (404)
    NotFound,

    /// Slot already booked (409)
    Conflict,

    /// Payment provider call failed (502)
    GatewayError,

    /// Server is missing gateway credentials or secrets (500)
    ConfigurationError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::InvalidSignature => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
            ErrorCode::ConfigurationError | ErrorCode::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        let code = match err.kind() {
            ErrorKind::Validation => ErrorCode::ValidationError,
            ErrorKind::Unauthorized => ErrorCode::InvalidSignature,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Conflict => ErrorCode::Conflict,
            ErrorKind::Upstream => ErrorCode::GatewayError,
            ErrorKind::Configuration => ErrorCode::ConfigurationError,
            ErrorKind::Internal => ErrorCode::Internal,
        };

        // Internal details stay in the log.
        let message = match code {
            ErrorCode::Internal => {
                error!(error = %err, "Request failed");
                "Internal server error".to_string()
            }
            _ => err.to_string(),
        };
        ApiError::new(code, message)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookpay_core::{GatewayName, SlotRejection};

    #[test]
    fn test_kind_to_status() {
        let cases = [
            (PaymentError::NoDefaultGateway, StatusCode::BAD_REQUEST),
            (PaymentError::Slot(SlotRejection::InPast), StatusCode::BAD_REQUEST),
            (PaymentError::Slot(SlotRejection::AlreadyBooked), StatusCode::CONFLICT),
            (PaymentError::TenantNotFound("t".into()), StatusCode::NOT_FOUND),
            (PaymentError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (
                PaymentError::gateway(GatewayName::Paystack, "timeout"),
                StatusCode::BAD_GATEWAY,
            ),
            (
                PaymentError::MissingWebhookSecret(GatewayName::Flutterwave),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).code.status(), status);
        }
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let err = ApiError::from(PaymentError::Internal("pool exploded".into()));
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(!err.message.contains("pool"));
    }

    #[test]
    fn test_serialized_shape() {
        let err = ApiError::new(ErrorCode::Conflict, "Time slot is already booked");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "CONFLICT");
        assert_eq!(json["message"], "Time slot is already booked");
    }
}
