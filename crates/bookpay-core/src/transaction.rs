//! # Transaction Rules
//!
//! Reference generation and the pure half of the transaction state machine.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │   current \ outcome │ Success            │ Failed           │ Pending  │
//! │   ──────────────────┼────────────────────┼──────────────────┼───────── │
//! │   pending           │ MoveTo(success) ★  │ MoveTo(failed)   │ Stay     │
//! │   success           │ AlreadySucceeded   │ AlreadySucceeded │ AS       │
//! │   failed/cancelled/ │ Terminal           │ Terminal         │ Terminal │
//! │   refunded          │                    │                  │          │
//! │                                                                         │
//! │   ★ the only transition that runs the reconciliation side effects      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Locking and persistence live in bookpay-db / bookpay-payments; this module
//! answers "what should happen" for a given row state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::TransactionStatus;

/// Failure reason recorded when the provider settled less than was asked.
pub const AMOUNT_MISMATCH_REASON: &str = "amount mismatch";

/// Builds a transaction reference: `TXN-<unix millis>-<8 hex chars>`.
///
/// ```rust
/// use bookpay_core::transaction::generate_reference;
/// use chrono::Utc;
///
/// let reference = generate_reference(Utc::now());
/// assert!(reference.starts_with("TXN-"));
/// ```
pub fn generate_reference(now: DateTime<Utc>) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("TXN-{}-{}", now.timestamp_millis(), &random[..8])
}

// =============================================================================
// Outcomes & Transitions
// =============================================================================

/// What a provider says about a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOutcome {
    Success,
    Failed,
    /// Not settled yet (abandoned checkout page, ongoing bank transfer, ...).
    Pending,
}

impl PaymentOutcome {
    /// Status the transaction takes if this outcome is applied to a pending row.
    pub fn target_status(&self) -> TransactionStatus {
        match self {
            PaymentOutcome::Success => TransactionStatus::Success,
            PaymentOutcome::Failed => TransactionStatus::Failed,
            PaymentOutcome::Pending => TransactionStatus::Pending,
        }
    }
}

/// Decision for one outcome against the current row status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Write the new status. `Success` here is the first success.
    MoveTo(TransactionStatus),
    /// Row is still pending and the provider has nothing final to say.
    Stay,
    /// Row already succeeded: short-circuit, never re-apply side effects.
    AlreadySucceeded,
    /// Row is failed/cancelled/refunded; automatic paths leave it alone.
    Terminal(TransactionStatus),
}

impl Transition {
    /// True for the pending → success move.
    pub fn is_first_success(&self) -> bool {
        matches!(self, Transition::MoveTo(TransactionStatus::Success))
    }
}

/// Plans the transition for `outcome` given the row's `current` status.
pub fn plan_transition(current: TransactionStatus, outcome: PaymentOutcome) -> Transition {
    match current {
        TransactionStatus::Success => Transition::AlreadySucceeded,
        TransactionStatus::Pending => match outcome {
            PaymentOutcome::Pending => Transition::Stay,
            other => Transition::MoveTo(other.target_status()),
        },
        terminal => Transition::Terminal(terminal),
    }
}

/// Validates an explicit status change requested by the engine.
pub fn ensure_transition(from: TransactionStatus, to: TransactionStatus) -> CoreResult<()> {
    let allowed = from == TransactionStatus::Pending
        && matches!(to, TransactionStatus::Success | TransactionStatus::Failed);
    if allowed {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition { from, to })
    }
}

/// Downgrades a success whose settled amount is short of the expected one.
///
/// Returns the outcome to apply and, for a downgrade, the failure reason.
pub fn check_settled_amount(
    outcome: PaymentOutcome,
    expected: Money,
    settled: Option<Money>,
) -> (PaymentOutcome, Option<&'static str>) {
    match (outcome, settled) {
        (PaymentOutcome::Success, Some(paid)) if paid < expected => {
            (PaymentOutcome::Failed, Some(AMOUNT_MISMATCH_REASON))
        }
        _ => (outcome, None),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
