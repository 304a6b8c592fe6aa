//! `handle_webhook`: the provider-driven push.
//!
//! Only authentication and parsing can fail the request. Everything after
//! that is logged and acknowledged, so providers do not retry a payload
//! that can never be processed.
//!
//! ## Dispositions
//! ```text
//! ┌──────────────────┬─────────────────────────────────────────────────────┐
//! │ Ignored          │ event carries no payment outcome                    │
//! │ MissingLinkage   │ unknown reference and no usable tenant in metadata  │
//! │ Unchanged        │ provider says the payment is still pending          │
//! │ AlreadyFinal     │ row was not pending (or another path won the CAS)   │
//! │ Succeeded        │ this call moved the row to success                  │
//! │ PaymentFailed    │ this call moved the row to failed                   │
//! │ SettledWithout.. │ row moved to success but booking/order/mail failed  │
//! │ ProcessingError  │ storage failed after the payload was accepted       │
//! └──────────────────┴─────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::PaymentService;
use crate::error::PaymentResult;
use crate::gateway::WebhookEvent;
use crate::mailer::dispatch;
use crate::reconcile;
use bookpay_core::fees::{compute_fee_with_cap, rate_for_tier};
use bookpay_core::transaction::{check_settled_amount, plan_transition};
use bookpay_core::{
    FeeBreakdown, GatewayName, Money, PaymentTransaction, TransactionStatus, Transition,
};
use bookpay_db::repository::transaction;
use bookpay_db::{NewTransaction, StatusUpdate};

/// What happened to an accepted webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDisposition {
    Ignored,
    MissingLinkage,
    Unchanged,
    AlreadyFinal,
    Succeeded,
    PaymentFailed,
    /// The row is `success` but its booking, order or emails were not
    /// written. Needs manual reconciliation.
    SettledWithoutEffects,
    ProcessingError,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip)]
    pub disposition: WebhookDisposition,
}

impl PaymentService {
    /// Authenticates, parses and applies one provider webhook.
    ///
    /// ## Errors
    /// - [`GatewayNotConfigured`](crate::PaymentError::GatewayNotConfigured)
    /// - [`MissingWebhookSecret`](crate::PaymentError::MissingWebhookSecret)
    /// - [`InvalidSignature`](crate::PaymentError::InvalidSignature)
    /// - [`MalformedPayload`](crate::PaymentError::MalformedPayload)
    pub async fn handle_webhook(
        &self,
        gateway: GatewayName,
        body: &[u8],
        signature: Option<&str>,
    ) -> PaymentResult<WebhookAck> {
        let adapter = self.gateways.get(gateway)?;
        adapter.verify_webhook(body, signature)?;
        let event = adapter.parse_webhook(body)?;

        info!(
            gateway = %gateway,
            event = %event.event,
            reference = %event.reference,
            "Webhook received"
        );

        let disposition = match self.apply_event(&event).await {
            Ok(disposition) => disposition,
            Err(e) => {
                error!(
                    gateway = %gateway,
                    reference = %event.reference,
                    error = %e,
                    "Webhook processing failed, acknowledging anyway"
                );
                WebhookDisposition::ProcessingError
            }
        };

        debug!(reference = %event.reference, ?disposition, "Webhook handled");
        Ok(WebhookAck {
            received: true,
            disposition,
        })
    }

    async fn apply_event(&self, event: &WebhookEvent) -> PaymentResult<WebhookDisposition> {
        let Some(reported) = event.outcome else {
            debug!(event = %event.event, "Webhook event ignored");
            return Ok(WebhookDisposition::Ignored);
        };

        let existing = self.db.transactions().find_by_reference(&event.reference).await?;
        let tx = match existing {
            Some(tx) => tx,
            None => match self.reconstruct(event).await? {
                Some(tx) => tx,
                None => return Ok(WebhookDisposition::MissingLinkage),
            },
        };

        let (outcome, mismatch) = check_settled_amount(reported, tx.amount, event.amount);
        if mismatch.is_some() {
            warn!(
                reference = %tx.reference,
                expected = %tx.amount,
                settled = ?event.amount,
                "Webhook reported success for less than the transaction amount"
            );
        }

        let target = match plan_transition(tx.status, outcome) {
            Transition::MoveTo(target) => target,
            Transition::Stay => return Ok(WebhookDisposition::Unchanged),
            Transition::AlreadySucceeded | Transition::Terminal(_) => {
                debug!(reference = %tx.reference, status = %tx.status, "Transaction already final");
                return Ok(WebhookDisposition::AlreadyFinal);
            }
        };

        let paid_at = event.paid_at.unwrap_or_else(|| self.clock.now_utc());
        let update = StatusUpdate {
            status: target,
            gateway_transaction_id: event.provider_transaction_id.clone(),
            gateway_response: Some(event.raw.clone()),
            failure_reason: match target {
                TransactionStatus::Failed => Some(
                    mismatch
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{} reported {}", event.gateway, event.event)),
                ),
                _ => None,
            },
            paid_at: (target == TransactionStatus::Success).then_some(paid_at),
        };

        let mut uow = self.db.autocommit().await?;
        let won = transaction::transition_if_pending(uow.conn(), &tx.reference, &update).await?;
        if !won {
            info!(reference = %tx.reference, "Lost webhook race, transaction already final");
            return Ok(WebhookDisposition::AlreadyFinal);
        }

        info!(reference = %tx.reference, status = %target, "Transaction updated from webhook");
        if target != TransactionStatus::Success {
            return Ok(WebhookDisposition::PaymentFailed);
        }

        // The status change above is already committed; a failure here
        // leaves a paid transaction with nothing to show for it.
        let effects = match reconcile::apply(uow.conn(), &tx, paid_at).await {
            Ok(effects) => effects,
            Err(e) => {
                error!(
                    reference = %tx.reference,
                    tenant_id = ?tx.tenant_id,
                    error = %e,
                    "Payment settled but side effects not applied, reconcile manually"
                );
                return Ok(WebhookDisposition::SettledWithoutEffects);
            }
        };
        uow.commit().await?;
        dispatch(self.mailer.as_ref(), effects.emails).await;

        Ok(WebhookDisposition::Succeeded)
    }

    /// Rebuilds a transaction whose `initialize` never reached the database.
    ///
    /// Tenant, linkage and fee come from the metadata echoed by the
    /// provider. The row is inserted as `pending` so the normal transition
    /// applies to it.
    async fn reconstruct(&self, event: &WebhookEvent) -> PaymentResult<Option<PaymentTransaction>> {
        let metadata = &event.metadata;
        let Some(tenant_id) = metadata.tenant_id.as_deref().filter(|t| !t.trim().is_empty()) else {
            warn!(
                reference = %event.reference,
                "Webhook for unknown transaction has no tenant_id in metadata"
            );
            return Ok(None);
        };
        let Some(tenant) = self.db.tenants().get(tenant_id).await? else {
            warn!(reference = %event.reference, tenant_id, "Webhook names an unknown tenant");
            return Ok(None);
        };
        let Some(amount) = event.amount else {
            warn!(reference = %event.reference, "Webhook for unknown transaction has no amount");
            return Ok(None);
        };

        let fees = match (metadata.platform_fee, metadata.merchant_amount) {
            (Some(fee), Some(net)) => FeeBreakdown {
                platform_fee: Money::from_minor(fee),
                merchant_amount: Money::from_minor(net),
            },
            _ => compute_fee_with_cap(
                amount,
                rate_for_tier(tenant.tier, self.fees.platform_rate()),
                self.fees.cap(),
            ),
        };

        let scope = tenant.scope();
        let new_tx = NewTransaction {
            reference: event.reference.clone(),
            tenant_id: scope.tenant_id().map(str::to_string),
            order_id: metadata.order_id,
            invoice_id: metadata.invoice_id,
            gateway_name: event.gateway,
            gateway_transaction_id: event.provider_transaction_id.clone(),
            amount,
            currency: event
                .currency
                .clone()
                .unwrap_or_else(|| self.fees.default_currency.clone()),
            platform_fee: fees.platform_fee,
            merchant_amount: fees.merchant_amount,
            customer_email: event
                .customer_email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .unwrap_or_default(),
            customer_name: event.customer_name.clone().or_else(|| metadata.customer_name.clone()),
            customer_phone: event.customer_phone.clone().or_else(|| metadata.customer_phone.clone()),
            status: TransactionStatus::Pending,
            gateway_response: Some(event.raw.clone()),
            metadata: metadata.clone(),
            paid_at: None,
        };

        let mut uow = self.db.autocommit().await?;
        match transaction::insert_reconstructed(uow.conn(), &new_tx).await? {
            Some(tx) => {
                info!(
                    reference = %tx.reference,
                    tenant_id = %tenant.id,
                    amount = %tx.amount,
                    "Transaction reconstructed from webhook"
                );
                Ok(Some(tx))
            }
            None => {
                debug!(reference = %event.reference, "Transaction created concurrently");
                Ok(transaction::find_by_reference(uow.conn(), &event.reference).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_serializes_received_only() {
        let ack = WebhookAck {
            received: true,
            disposition: WebhookDisposition::Ignored,
        };
        assert_eq!(
            serde_json::to_value(ack).unwrap(),
            serde_json::json!({"received": true})
        );
    }
}
