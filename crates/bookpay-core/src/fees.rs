//! # Fee Calculator
//!
//! Platform fee, merchant share and the optional split instruction.
//!
//! ## Rule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  platform_fee    = min(amount × rate, FEE_CAP)                          │
//! │  merchant_amount = amount − platform_fee                                │
//! │                                                                         │
//! │  20,000.00 @ 3%  → 600.00 capped to 500.00 → merchant 19,500.00        │
//! │   1,000.00 @ 3%  →  30.00                  → merchant    970.00        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The rate depends on the tenant tier: shared tenants pay the platform rate,
//! dedicated tenants pay nothing. Because the fee is capped, providers are told
//! a FIXED platform charge rather than a percentage.

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{FeeRate, TenantTier};
use crate::FEE_CAP;

/// Result of [`compute_fee`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub platform_fee: Money,
    pub merchant_amount: Money,
}

/// Routes a fixed platform charge away from the merchant's sub-account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitInstruction {
    /// Provider sub-account code of the merchant.
    pub subaccount: String,
    /// Amount kept by the platform, in minor units.
    pub transaction_charge: Money,
}

/// Computes the capped platform fee for `amount`.
///
/// ```rust
/// use bookpay_core::fees::compute_fee;
/// use bookpay_core::money::Money;
/// use bookpay_core::types::FeeRate;
///
/// let fee = compute_fee(Money::from_major(20_000), FeeRate::from_bps(300));
/// assert_eq!(fee.platform_fee, Money::from_major(500));
/// assert_eq!(fee.merchant_amount, Money::from_major(19_500));
/// ```
pub fn compute_fee(amount: Money, rate: FeeRate) -> FeeBreakdown {
    compute_fee_with_cap(amount, rate, FEE_CAP)
}

/// [`compute_fee`] with a deployment-specific ceiling instead of [`FEE_CAP`].
pub fn compute_fee_with_cap(amount: Money, rate: FeeRate, cap: Money) -> FeeBreakdown {
    let platform_fee = if amount.is_positive() {
        amount.apply_rate(rate).min(cap)
    } else {
        Money::zero()
    };
    FeeBreakdown {
        platform_fee,
        merchant_amount: amount - platform_fee,
    }
}

/// Fee rate a tenant pays given the configured platform rate.
pub fn rate_for_tier(tier: TenantTier, platform_rate: FeeRate) -> FeeRate {
    match tier {
        TenantTier::Shared => platform_rate,
        TenantTier::Dedicated => FeeRate::zero(),
    }
}

/// Builds the split instruction when the merchant has a sub-account and
/// there is a fee to route.
pub fn split_instruction(
    subaccount: Option<&str>,
    fees: &FeeBreakdown,
) -> Option<SplitInstruction> {
    let subaccount = subaccount.map(str::trim).filter(|s| !s.is_empty())?;
    if !fees.platform_fee.is_positive() {
        return None;
    }
    Some(SplitInstruction {
        subaccount: subaccount.to_string(),
        transaction_charge: fees.platform_fee,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_PERCENT: FeeRate = FeeRate::from_bps(300);

    #[test]
    fn test_fee_is_capped() {
        let fee = compute_fee(Money::from_major(20_000), THREE_PERCENT);
        assert_eq!(fee.platform_fee, Money::from_major(500));
        assert_eq!(fee.merchant_amount, Money::from_major(19_500));
    }

    #[test]
    fn test_fee_below_cap() {
        let fee = compute_fee(Money::from_major(1_000), THREE_PERCENT);
        assert_eq!(fee.platform_fee, Money::from_major(30));
        assert_eq!(fee.merchant_amount, Money::from_major(970));
    }

    #[test]
    fn test_custom_cap() {
        let fee = compute_fee_with_cap(
            Money::from_major(20_000),
            THREE_PERCENT,
            Money::from_major(250),
        );
        assert_eq!(fee.platform_fee, Money::from_major(250));
        assert_eq!(fee.merchant_amount, Money::from_major(19_750));
    }

    #[test]
    fn test_zero_rate_and_zero_amount() {
        let fee = compute_fee(Money::from_major(5_000), FeeRate::zero());
        assert!(fee.platform_fee.is_zero());
        assert_eq!(fee.merchant_amount, Money::from_major(5_000));

        let fee = compute_fee(Money::zero(), THREE_PERCENT);
        assert!(fee.platform_fee.is_zero());
        assert!(fee.merchant_amount.is_zero());
    }

    #[test]
    fn test_rate_for_tier() {
        assert_eq!(rate_for_tier(TenantTier::Shared, THREE_PERCENT), THREE_PERCENT);
        assert!(rate_for_tier(TenantTier::Dedicated, THREE_PERCENT).is_zero());
    }

    #[test]
    fn test_split_instruction() {
        let fees = compute_fee(Money::from_major(20_000), THREE_PERCENT);

        let split = split_instruction(Some("ACCT_123"), &fees).unwrap();
        assert_eq!(split.subaccount, "ACCT_123");
        assert_eq!(split.transaction_charge.minor(), 50_000);

        assert!(split_instruction(None, &fees).is_none());
        assert!(split_instruction(Some("  "), &fees).is_none());

        let free = compute_fee(Money::from_major(20_000), FeeRate::zero());
        assert!(split_instruction(Some("ACCT_123"), &free).is_none());
    }
}
