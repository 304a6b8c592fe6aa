//! `initialize`: validate, price, persist as pending, start the payment.
//!
//! Slot validation runs before the row is written, so a rejected booking
//! never leaves a transaction behind.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::PaymentService;
use crate::booking_guard;
use crate::error::PaymentResult;
use crate::gateway::InitRequest;
use bookpay_core::fees::{compute_fee_with_cap, rate_for_tier, split_instruction};
use bookpay_core::transaction::generate_reference;
use bookpay_core::validation::{
    validate_amount, validate_currency, validate_email, validate_tenant_id,
};
use bookpay_core::{GatewayName, Money, PaymentMetadata, TransactionStatus, ValidationError};
use bookpay_db::NewTransaction;

/// Caller input for starting a payment. Amounts are in major units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InitializeRequest {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub invoice_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub redirect_url: Option<String>,
    #[serde(default)]
    pub metadata: PaymentMetadata,
}

/// What the caller needs to send the payer to checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializeResponse {
    pub transaction_reference: String,
    pub authorization_url: String,
    pub gateway: GatewayName,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub platform_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub merchant_amount: Decimal,
    pub currency: String,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PaymentService {
    /// Starts a payment with the default gateway.
    ///
    /// ## Steps
    /// 1. Validate amount, email, currency and tenant
    /// 2. For booking payments, check the slot is bookable and free
    /// 3. Compute the fee and split instruction from the tenant's tier
    /// 4. Insert the `pending` transaction
    /// 5. Ask the provider for an authorization URL; a provider failure
    ///    marks the row failed and is returned to the caller
    pub async fn initialize(&self, request: InitializeRequest) -> PaymentResult<InitializeResponse> {
        let amount = request
            .amount
            .ok_or_else(|| ValidationError::required("amount"))?;
        let amount = Money::from_major_decimal(amount)?;
        validate_amount(amount)?;

        let email = validate_email(request.email.as_deref().unwrap_or_default())?;
        let currency = match request.currency.as_deref() {
            Some(code) if !code.trim().is_empty() => validate_currency(code)?,
            _ => self.fees.default_currency.clone(),
        };
        let tenant_id = validate_tenant_id(request.tenant_id.as_deref().unwrap_or_default())?;

        let tenant = self.active_tenant(&tenant_id).await?;
        let scope = tenant.scope();
        let gateway = self.gateways.default_gateway()?;

        let mut metadata = request.metadata;
        if let Some(booking) = metadata.booking_request() {
            let slot =
                booking_guard::check(&self.db, &tenant, &booking, self.clock.now_local()).await?;
            info!(
                tenant_id = %tenant.id,
                service_id = slot.service.id,
                scheduled_at = %slot.scheduled_at,
                "Booking slot available"
            );
        }

        let rate = rate_for_tier(tenant.tier, self.fees.platform_rate());
        let fees = compute_fee_with_cap(amount, rate, self.fees.cap());
        let split = split_instruction(tenant.subaccount_code.as_deref(), &fees);

        let name = non_empty(request.name);
        let phone = non_empty(request.phone);
        let reference = generate_reference(self.clock.now_utc());

        metadata.tenant_id = Some(tenant.id.clone());
        metadata.order_id = request.order_id.or(metadata.order_id);
        metadata.invoice_id = request.invoice_id.or(metadata.invoice_id);
        metadata.platform_fee = Some(fees.platform_fee.minor());
        metadata.merchant_amount = Some(fees.merchant_amount.minor());
        if metadata.customer_name.is_none() {
            metadata.customer_name = name.clone();
        }
        if metadata.customer_phone.is_none() {
            metadata.customer_phone = phone.clone();
        }

        let tx = self
            .db
            .transactions()
            .insert(&NewTransaction {
                reference: reference.clone(),
                tenant_id: scope.tenant_id().map(str::to_string),
                order_id: metadata.order_id,
                invoice_id: metadata.invoice_id,
                gateway_name: gateway.name(),
                gateway_transaction_id: None,
                amount,
                currency: currency.clone(),
                platform_fee: fees.platform_fee,
                merchant_amount: fees.merchant_amount,
                customer_email: email.clone(),
                customer_name: name.clone(),
                customer_phone: phone,
                status: TransactionStatus::Pending,
                gateway_response: None,
                metadata: metadata.clone(),
                paid_at: None,
            })
            .await?;

        info!(
            reference = %reference,
            tenant_id = %tenant.id,
            gateway = %gateway.name(),
            amount = %amount,
            platform_fee = %fees.platform_fee,
            "Transaction created"
        );

        let init = InitRequest {
            reference: reference.clone(),
            amount,
            currency: currency.clone(),
            email,
            customer_name: name,
            redirect_url: non_empty(request.redirect_url).or_else(|| self.default_callback_url.clone()),
            metadata,
            split,
        };

        let started = match gateway.initialize(&init).await {
            Ok(started) => started,
            Err(e) => {
                warn!(reference = %reference, error = %e, "Gateway initialization failed");
                if let Err(mark) = self.db.transactions().fail_pending(tx.id, &e.to_string()).await {
                    error!(reference = %reference, error = %mark, "Could not mark transaction failed");
                }
                return Err(e);
            }
        };

        self.db
            .transactions()
            .record_initialization(tx.id, started.provider_reference.as_deref(), &started.raw)
            .await?;

        Ok(InitializeResponse {
            transaction_reference: reference,
            authorization_url: started.authorization_url,
            gateway: gateway.name(),
            amount: amount.to_major_decimal(),
            platform_fee: fees.platform_fee.to_major_decimal(),
            merchant_amount: fees.merchant_amount.to_major_decimal(),
            currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_accepts_numeric_amount() {
        let request: InitializeRequest = serde_json::from_str(
            r#"{
                "tenant_id": "salon",
                "amount": 5000,
                "email": "a@b.com",
                "metadata": {"service_id": 7, "scheduled_at": "2026-02-02T09:00:00", "is_booking": true}
            }"#,
        )
        .unwrap();
        assert_eq!(request.amount, Some(Decimal::from(5000)));
        assert_eq!(request.metadata.service_id, Some(7));
        assert!(request.metadata.booking_request().is_some());
    }

    #[test]
    fn test_request_fields_are_optional() {
        let request: InitializeRequest = serde_json::from_str("{}").unwrap();
        assert!(request.amount.is_none());
        assert!(request.email.is_none());
    }

    #[test]
    fn test_response_amounts_are_numbers() {
        let response = InitializeResponse {
            transaction_reference: "TXN-1-abcdef12".into(),
            authorization_url: "https://checkout.example/abc".into(),
            gateway: GatewayName::Paystack,
            amount: Decimal::new(500000, 2),
            platform_fee: Decimal::new(15000, 2),
            merchant_amount: Decimal::new(485000, 2),
            currency: "NGN".into(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["amount"], serde_json::json!(5000.0));
        assert_eq!(json["gateway"], "paystack");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  Ada ".into())), Some("Ada".into()));
        assert_eq!(non_empty(Some("   ".into())), None);
        assert_eq!(non_empty(None), None);
    }
}
