//! # Payment Error Types
//!
//! Error types for the reconciliation engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Payment Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Validation    │  │    Not Found    │  │       Conflict          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Validation     │  │  TenantNotFound │  │  Slot(AlreadyBooked)    │ │
//! │  │  Slot(reason)   │  │  ServiceNotFound│  │                         │ │
//! │  │  NoDefaultGw    │  │  TransactionNF  │  │                         │ │
//! │  │  Malformed      │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Upstream     │  │  Configuration  │  │      Unauthorized       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Gateway        │  │  InvalidConfig  │  │  InvalidSignature       │ │
//! │  │                 │  │  MissingSecret  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Double-applying a side effect is never an error: the idempotent guards in
//! the reconciliation step turn it into a no-op.

use thiserror::Error;

use bookpay_core::{CoreError, GatewayName, SlotRejection, ValidationError};
use bookpay_db::DbError;

/// Result type alias for engine operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Category of a [`PaymentError`], used by the HTTP layer to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Upstream,
    Configuration,
    Unauthorized,
    Internal,
}

/// Engine error type.
#[derive(Debug, Error)]
pub enum PaymentError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Requested appointment cannot be booked.
    #[error(transparent)]
    Slot(#[from] SlotRejection),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No active default payment gateway configured")]
    NoDefaultGateway,

    /// Webhook body is not the JSON shape the provider documents.
    #[error("Malformed {gateway} payload: {reason}")]
    MalformedPayload { gateway: GatewayName, reason: String },

    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(i64),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    /// The provider call failed or answered with an error.
    #[error("{gateway} request failed: {message}")]
    Gateway { gateway: GatewayName, message: String },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid payments configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Gateway {0} is not configured")]
    GatewayNotConfigured(GatewayName),

    #[error("No webhook secret configured for {0}")]
    MissingWebhookSecret(GatewayName),

    // =========================================================================
    // Authentication Errors
    // =========================================================================
    #[error("Invalid or missing webhook signature")]
    InvalidSignature,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error(transparent)]
    Database(#[from] DbError),

    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    pub fn gateway(gateway: GatewayName, message: impl Into<String>) -> Self {
        PaymentError::Gateway {
            gateway,
            message: message.into(),
        }
    }

    pub fn malformed(gateway: GatewayName, reason: impl ToString) -> Self {
        PaymentError::MalformedPayload {
            gateway,
            reason: reason.to_string(),
        }
    }

    /// Maps the error onto the engine's failure taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::Validation(_)
            | PaymentError::InvalidAmount(_)
            | PaymentError::NoDefaultGateway
            | PaymentError::MalformedPayload { .. } => ErrorKind::Validation,

            PaymentError::Slot(reason) if reason.is_conflict() => ErrorKind::Conflict,
            PaymentError::Slot(_) => ErrorKind::Validation,

            PaymentError::TenantNotFound(_)
            | PaymentError::ServiceNotFound(_)
            | PaymentError::TransactionNotFound(_) => ErrorKind::NotFound,

            PaymentError::Gateway { .. } => ErrorKind::Upstream,

            PaymentError::InvalidConfig(_)
            | PaymentError::ConfigLoadFailed(_)
            | PaymentError::GatewayNotConfigured(_)
            | PaymentError::MissingWebhookSecret(_) => ErrorKind::Configuration,

            PaymentError::InvalidSignature => ErrorKind::Unauthorized,

            PaymentError::Database(DbError::NotFound { .. }) => ErrorKind::NotFound,
            PaymentError::Database(_)
            | PaymentError::InvalidTransition(_)
            | PaymentError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<CoreError> for PaymentError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Slot(reason) => PaymentError::Slot(reason),
            CoreError::Validation(e) => PaymentError::Validation(e),
            CoreError::InvalidAmount { reason } => PaymentError::InvalidAmount(reason),
            transition @ CoreError::InvalidTransition { .. } => {
                PaymentError::InvalidTransition(transition.to_string())
            }
        }
    }
}

impl From<std::io::Error> for PaymentError {
    fn from(err: std::io::Error) -> Self {
        PaymentError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for PaymentError {
    fn from(err: toml::de::Error) -> Self {
        PaymentError::ConfigLoadFailed(err.to_string())
    }
}
