//! Webhook signature verification.
//!
//! Both providers sign the raw request body with an HMAC; they differ in
//! hash and encoding. Comparisons are constant-time.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

use crate::error::{PaymentError, PaymentResult};

/// Lowercase hex HMAC-SHA512 of `body` (Paystack `x-paystack-signature`).
pub fn hmac_sha512_hex(secret: &str, body: &[u8]) -> PaymentResult<String> {
    let mut mac = Hmac::<Sha512>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Internal("invalid HMAC key".into()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Base64 HMAC-SHA256 of `body` (Flutterwave `flutterwave-signature`).
pub fn hmac_sha256_base64(secret: &str, body: &[u8]) -> PaymentResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| PaymentError::Internal("invalid HMAC key".into()))?;
    mac.update(body);
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison.
pub fn signatures_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Verifies a Paystack signature header.
pub fn verify_paystack(secret: &str, body: &[u8], header: Option<&str>) -> PaymentResult<()> {
    let provided = header
        .map(|h| h.trim().to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or(PaymentError::InvalidSignature)?;
    let expected = hmac_sha512_hex(secret, body)?;
    if signatures_match(&expected, &provided) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

/// Verifies a Flutterwave signature header.
pub fn verify_flutterwave(secret: &str, body: &[u8], header: Option<&str>) -> PaymentResult<()> {
    let provided = header
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(PaymentError::InvalidSignature)?;
    let expected = hmac_sha256_base64(secret, body)?;
    if signatures_match(&expected, provided) {
        Ok(())
    } else {
        Err(PaymentError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"event":"charge.success","data":{"reference":"TXN-1"}}"#;

    #[test]
    fn test_paystack_round_trip() {
        let sig = hmac_sha512_hex("sk_test", BODY).unwrap();
        assert_eq!(sig.len(), 128);
        assert!(verify_paystack("sk_test", BODY, Some(&sig)).is_ok());
        // Header case does not matter for hex
        assert!(verify_paystack("sk_test", BODY, Some(&sig.to_uppercase())).is_ok());
    }

    #[test]
    fn test_paystack_rejects_tampering() {
        let sig = hmac_sha512_hex("sk_test", BODY).unwrap();
        assert!(matches!(
            verify_paystack("sk_other", BODY, Some(&sig)),
            Err(PaymentError::InvalidSignature)
        ));
        assert!(verify_paystack("sk_test", b"{}", Some(&sig)).is_err());
        assert!(verify_paystack("sk_test", BODY, None).is_err());
        assert!(verify_paystack("sk_test", BODY, Some("  ")).is_err());
    }

    #[test]
    fn test_flutterwave_round_trip() {
        let sig = hmac_sha256_base64("whsec", BODY).unwrap();
        assert!(verify_flutterwave("whsec", BODY, Some(&sig)).is_ok());
        assert!(verify_flutterwave("whsec", BODY, Some("bm9wZQ==")).is_err());
        assert!(verify_flutterwave("whsec", BODY, None).is_err());
    }

    #[test]
    fn test_signatures_match_length_mismatch() {
        assert!(!signatures_match("abc", "abcd"));
        assert!(signatures_match("abc", "abc"));
    }
}
