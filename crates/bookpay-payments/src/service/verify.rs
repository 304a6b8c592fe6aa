//! `verify`: the caller-driven poll / redirect callback.
//!
//! ```text
//! read row ── success? ──────────────────────────────► already_verified
//!    │
//!    ▼
//! provider.verify ──► BEGIN ──► lock row ──► success now? ──► rollback,
//!                                   │                         already_verified
//!                                   ▼
//!                         UPDATE status (+ apply side effects)
//!                                   │
//!                                COMMIT ──► emails
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::PaymentService;
use crate::error::{PaymentError, PaymentResult};
use crate::mailer::dispatch;
use crate::reconcile;
use bookpay_core::transaction::{check_settled_amount, ensure_transition, plan_transition};
use bookpay_core::validation::{validate_reference, validate_tenant_id};
use bookpay_core::{GatewayName, PaymentTransaction, TransactionStatus, Transition};
use bookpay_db::repository::transaction;
use bookpay_db::StatusUpdate;

/// Public view of a transaction after verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub reference: String,
    pub status: TransactionStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub platform_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub merchant_amount: Decimal,
    pub currency: String,
    pub gateway: GatewayName,
    pub paid_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// True when the row was already `success` before this call.
    pub already_verified: bool,
    pub booking_id: Option<i64>,
    pub order_id: Option<i64>,
    pub invoice_id: Option<i64>,
}

impl VerificationResult {
    fn new(tx: &PaymentTransaction, already_verified: bool, booking_id: Option<i64>) -> Self {
        VerificationResult {
            reference: tx.reference.clone(),
            status: tx.status,
            amount: tx.amount.to_major_decimal(),
            platform_fee: tx.platform_fee.to_major_decimal(),
            merchant_amount: tx.merchant_amount.to_major_decimal(),
            currency: tx.currency.clone(),
            gateway: tx.gateway_name,
            paid_at: tx.paid_at,
            failure_reason: tx.failure_reason.clone(),
            already_verified,
            booking_id,
            order_id: tx.order_id,
            invoice_id: tx.invoice_id,
        }
    }
}

impl PaymentService {
    /// Verifies a payment with its provider and settles the transaction.
    ///
    /// Idempotent: a transaction that already succeeded is returned as-is
    /// with `already_verified = true`, without calling the provider.
    pub async fn verify(&self, tenant_id: &str, reference: &str) -> PaymentResult<VerificationResult> {
        let tenant_id = validate_tenant_id(tenant_id)?;
        let reference = validate_reference(reference)?;

        let tenant = self.active_tenant(&tenant_id).await?;
        let scope = tenant.scope();

        let current = self
            .db
            .transactions()
            .get_by_reference(&scope, &reference)
            .await?
            .ok_or_else(|| PaymentError::TransactionNotFound(reference.clone()))?;

        if current.status == TransactionStatus::Success {
            debug!(reference = %reference, "Transaction already verified");
            return self.settled(&current, true).await;
        }
        if current.status.is_terminal() {
            debug!(reference = %reference, status = %current.status, "Transaction is final");
            return self.settled(&current, false).await;
        }

        let gateway = self.gateways.get(current.gateway_name)?;
        let verified = gateway.verify(&reference).await?;
        let (outcome, mismatch) = check_settled_amount(verified.outcome, current.amount, verified.amount);
        if let Some(reason) = mismatch {
            warn!(
                reference = %reference,
                expected = %current.amount,
                settled = ?verified.amount,
                reason,
                "Provider reported success for less than the transaction amount"
            );
        }

        let mut uow = self.db.begin().await?;
        let Some(locked) = transaction::lock_by_reference(uow.conn(), &scope, &reference).await? else {
            uow.rollback().await?;
            return Err(PaymentError::TransactionNotFound(reference));
        };

        let target = match plan_transition(locked.status, outcome) {
            Transition::AlreadySucceeded => {
                uow.rollback().await?;
                info!(reference = %reference, "Lost verification race, transaction already succeeded");
                return self.settled(&locked, true).await;
            }
            Transition::Stay | Transition::Terminal(_) => {
                uow.rollback().await?;
                debug!(reference = %reference, status = %locked.status, ?outcome, "No status change");
                return self.settled(&locked, false).await;
            }
            Transition::MoveTo(target) => target,
        };
        ensure_transition(locked.status, target)?;

        let paid_at = verified.paid_at.unwrap_or_else(|| self.clock.now_utc());
        let update = StatusUpdate {
            status: target,
            gateway_transaction_id: verified.provider_transaction_id.clone(),
            gateway_response: Some(verified.raw.clone()),
            failure_reason: match target {
                TransactionStatus::Failed => Some(
                    mismatch
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("declined by {}", gateway.name())),
                ),
                _ => None,
            },
            paid_at: (target == TransactionStatus::Success).then_some(paid_at),
        };
        transaction::update_status(uow.conn(), locked.id, &update).await?;

        let effects = if target == TransactionStatus::Success {
            Some(reconcile::apply(uow.conn(), &locked, paid_at).await?)
        } else {
            None
        };
        uow.commit().await?;

        info!(
            reference = %reference,
            status = %target,
            gateway = %gateway.name(),
            "Transaction verified"
        );

        let mut booking_id = None;
        if let Some(effects) = effects {
            booking_id = effects.booking_id;
            dispatch(self.mailer.as_ref(), effects.emails).await;
        }

        let settled = self
            .db
            .transactions()
            .get_by_reference(&scope, &reference)
            .await?
            .ok_or(PaymentError::TransactionNotFound(reference))?;
        match booking_id {
            Some(_) => Ok(VerificationResult::new(&settled, false, booking_id)),
            None => self.settled(&settled, false).await,
        }
    }

    async fn settled(
        &self,
        tx: &PaymentTransaction,
        already_verified: bool,
    ) -> PaymentResult<VerificationResult> {
        let booking_id = self
            .db
            .bookings()
            .get_for_transaction(tx.id)
            .await?
            .map(|b| b.id);
        Ok(VerificationResult::new(tx, already_verified, booking_id))
    }
}
