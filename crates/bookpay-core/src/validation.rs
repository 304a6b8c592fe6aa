//! # Validation Module
//!
//! Input validation for the payment entry points.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: HTTP (axum Json extractor)                                   │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Required fields, formats, positive amounts                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── UNIQUE (reference, booking per payment), NOT NULL, FK             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::money::Money;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a customer email and returns it trimmed and lowercased.
///
/// ## Rules
/// - Must not be empty
/// - At most 254 characters
/// - Exactly one `@`, a non-empty local part and a dotted domain
///
/// ```rust
/// use bookpay_core::validation::validate_email;
///
/// assert_eq!(validate_email(" A@B.com ").unwrap(), "a@b.com");
/// assert!(validate_email("nope").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<String> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::required("email"));
    }

    if email.len() > 254 {
        return Err(ValidationError::TooLong {
            field: "email".to_string(),
            max: 254,
        });
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(ValidationError::invalid("email", "must contain a single @")),
    };

    let domain_ok = domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains(char::is_whitespace);
    if local.is_empty() || local.contains(char::is_whitespace) || !domain_ok {
        return Err(ValidationError::invalid("email", "not a valid address"));
    }

    Ok(email.to_lowercase())
}

/// Validates an ISO-4217 style currency code and returns it uppercased.
pub fn validate_currency(code: &str) -> ValidationResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::invalid(
            "currency",
            "must be a three-letter code",
        ));
    }
    Ok(code.to_ascii_uppercase())
}

/// Validates a tenant identifier.
pub fn validate_tenant_id(tenant_id: &str) -> ValidationResult<String> {
    let tenant_id = tenant_id.trim();
    if tenant_id.is_empty() {
        return Err(ValidationError::required("tenant_id"));
    }
    if tenant_id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "tenant_id".to_string(),
            max: 64,
        });
    }
    Ok(tenant_id.to_string())
}

/// Validates a transaction reference supplied on verify.
pub fn validate_reference(reference: &str) -> ValidationResult<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(ValidationError::required("reference"));
    }
    if reference.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "reference".to_string(),
            max: 100,
        });
    }
    Ok(reference.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a payment amount.
///
/// ## Rules
/// - Must be positive (> 0); a zero charge cannot be initialized
pub fn validate_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("a@b.com").unwrap(), "a@b.com");
        assert_eq!(validate_email("  Ada@Example.NG ").unwrap(), "ada@example.ng");

        assert_eq!(validate_email("   "), Err(ValidationError::required("email")));
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("a@@b.com").is_err());
        assert!(validate_email("@b.com").is_err());
        assert!(validate_email("a b@c.com").is_err());
    }

    #[test]
    fn test_validate_currency() {
        assert_eq!(validate_currency("ngn").unwrap(), "NGN");
        assert!(validate_currency("NAIRA").is_err());
        assert!(validate_currency("N1N").is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(Money::from_minor(1)).is_ok());
        assert!(matches!(
            validate_amount(Money::zero()),
            Err(ValidationError::MustBePositive { .. })
        ));
        assert!(validate_amount(Money::from_minor(-100)).is_err());
    }

    #[test]
    fn test_validate_identifiers() {
        assert_eq!(validate_tenant_id(" t-1 ").unwrap(), "t-1");
        assert!(validate_tenant_id("").is_err());
        assert_eq!(validate_reference("TXN-1-abc").unwrap(), "TXN-1-abc");
        assert!(validate_reference(&"x".repeat(101)).is_err());
    }
}
