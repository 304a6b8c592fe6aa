//! # Error Types
//!
//! Domain-specific error types for bookpay-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bookpay-core errors (this file)                                       │
//! │  ├── CoreError        - General domain errors                          │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── SlotRejection    - Why a requested appointment cannot be booked   │
//! │                                                                         │
//! │  bookpay-db errors                                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bookpay-payments errors                                               │
//! │  └── PaymentError     - Engine failures, carries the HTTP category     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PaymentError → ApiError → caller  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::TransactionStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested appointment slot cannot be reserved.
    #[error(transparent)]
    Slot(#[from] SlotRejection),

    /// A status change the transaction state machine does not allow.
    ///
    /// ## When This Occurs
    /// - Marking a `success` transaction as `failed`
    /// - Any automatic move out of a terminal state
    #[error("Transaction cannot move from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// Amount cannot be represented in minor units.
    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Slot Rejection
// =============================================================================

/// Reasons a requested appointment instant is refused before payment.
///
/// Every variant except [`SlotRejection::AlreadyBooked`] is a 400 at the HTTP
/// boundary; `AlreadyBooked` is a 409.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotRejection {
    #[error("Invalid scheduled_at format: {0}")]
    InvalidFormat(String),

    #[error("Cannot book a time in the past")]
    InPast,

    #[error("Cannot book a date in a previous year")]
    PreviousYear,

    #[error("No availability configured for {weekday}")]
    NoAvailability { weekday: String },

    #[error("Requested time {time} is outside the available hours")]
    OutsideWindow { time: String },

    #[error("Requested time {time} is not a valid slot start")]
    NotSlotStart { time: String },

    #[error("This time slot is already booked")]
    AlreadyBooked,
}

impl SlotRejection {
    /// Returns true for the overlap rejection (HTTP 409).
    pub fn is_conflict(&self) -> bool {
        matches!(self, SlotRejection::AlreadyBooked)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid email, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_rejection_messages() {
        let err = SlotRejection::NoAvailability {
            weekday: "Sunday".to_string(),
        };
        assert_eq!(err.to_string(), "No availability configured for Sunday");
        assert_eq!(
            SlotRejection::AlreadyBooked.to_string(),
            "This time slot is already booked"
        );
    }

    #[test]
    fn test_only_already_booked_is_conflict() {
        assert!(SlotRejection::AlreadyBooked.is_conflict());
        assert!(!SlotRejection::InPast.is_conflict());
        assert!(!SlotRejection::NotSlotStart {
            time: "09:10".into()
        }
        .is_conflict());
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = CoreError::InvalidTransition {
            from: TransactionStatus::Success,
            to: TransactionStatus::Failed,
        };
        assert_eq!(err.to_string(), "Transaction cannot move from success to failed");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let core_err: CoreError = ValidationError::required("email").into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.to_string(), "Validation error: email is required");
    }
}
