//! # Reconciliation Applier
//!
//! Side effects of a payment's first success. Runs on whatever connection
//! the caller's unit of work provides: inside the locked transaction on the
//! verify path, statement-by-statement on the webhook path.
//!
//! ## Steps & Guards
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order_id?   UPDATE orders ... WHERE payment_status != 'paid'           │
//! │              changed → queue order confirmation                         │
//! │                                                                         │
//! │  invoice_id? (only if no order row changed)                             │
//! │              UPDATE invoices ... WHERE status != 'paid'                 │
//! │                                                                         │
//! │  booking?    store present unless shared tier                           │
//! │              no booking for this payment yet                            │
//! │              customer: email → phone → new                              │
//! │              INSERT ... ON CONFLICT(payment_transaction_id) DO NOTHING  │
//! │              inserted → queue booking confirmation                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every write is conditional, so applying twice is a no-op. Emails are
//! returned, not sent.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use crate::error::PaymentResult;
use crate::mailer::{BookingConfirmation, OrderConfirmation, PendingEmail};
use bookpay_core::availability::{effective_duration, parse_scheduled_at};
use bookpay_core::{
    BookingRequest, BookingStatus, PaymentTransaction, TenantScope, TenantTier,
};
use bookpay_db::repository::{booking, customer, order, service, tenant};
use bookpay_db::{CustomerContact, NewBooking};

/// What one application actually changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedEffects {
    pub order_paid: bool,
    pub invoice_paid: bool,
    pub booking_id: Option<i64>,
    /// Emails to send once the surrounding unit of work has committed.
    pub emails: Vec<PendingEmail>,
}

impl AppliedEffects {
    pub fn is_empty(&self) -> bool {
        !self.order_paid && !self.invoice_paid && self.booking_id.is_none()
    }
}

/// Applies the side effects of `tx` succeeding.
pub async fn apply(
    conn: &mut SqliteConnection,
    tx: &PaymentTransaction,
    paid_at: DateTime<Utc>,
) -> PaymentResult<AppliedEffects> {
    let scope = TenantScope::from_row(tx.tenant_id.as_deref());
    let mut effects = AppliedEffects::default();

    if let Some(order_id) = tx.order_id {
        effects.order_paid =
            order::mark_order_paid(conn, &scope, order_id, &tx.reference, paid_at).await?;
        if effects.order_paid {
            if let Some(o) = order::get_order(conn, &scope, order_id).await? {
                let to = o.customer_email.clone().unwrap_or_else(|| tx.customer_email.clone());
                effects.emails.push(PendingEmail::Order(OrderConfirmation {
                    to,
                    customer_name: o.customer_name.or_else(|| tx.customer_name.clone()),
                    order_number: o.order_number,
                    total: o.total,
                    reference: tx.reference.clone(),
                }));
            }
        }
    }

    if let Some(invoice_id) = tx.invoice_id {
        if !effects.order_paid {
            effects.invoice_paid =
                order::mark_invoice_paid(conn, &scope, invoice_id, paid_at).await?;
        }
    }

    if let Some(request) = tx.metadata.booking_request() {
        if let Some((booking_id, email)) = create_booking(conn, &scope, tx, &request).await? {
            effects.booking_id = Some(booking_id);
            effects.emails.extend(email);
        }
    }

    info!(
        reference = %tx.reference,
        order_paid = effects.order_paid,
        invoice_paid = effects.invoice_paid,
        booking_id = ?effects.booking_id,
        "Payment side effects applied"
    );
    Ok(effects)
}

/// Creates the booking a payment pays for, once.
///
/// Returns `None` when the booking is skipped or already exists.
async fn create_booking(
    conn: &mut SqliteConnection,
    scope: &TenantScope,
    tx: &PaymentTransaction,
    request: &BookingRequest,
) -> PaymentResult<Option<(i64, Option<PendingEmail>)>> {
    let shared_tier = match tx.tenant_id.as_deref() {
        Some(id) => tenant::get(conn, id)
            .await?
            .map_or(true, |t| t.tier == TenantTier::Shared),
        None => false,
    };
    if request.store_id.is_none() && !shared_tier {
        warn!(reference = %tx.reference, "Booking payment without store_id, booking skipped");
        return Ok(None);
    }

    if let Some(existing) = booking::get_for_transaction(conn, tx.id).await? {
        debug!(reference = %tx.reference, booking_id = existing.id, "Booking already exists");
        return Ok(None);
    }

    let Some(svc) = service::get(conn, scope, request.service_id).await? else {
        warn!(
            reference = %tx.reference,
            service_id = request.service_id,
            "Booked service not found, booking skipped"
        );
        return Ok(None);
    };

    let scheduled_at = match parse_scheduled_at(&request.scheduled_at) {
        Ok(at) => at,
        Err(e) => {
            warn!(reference = %tx.reference, error = %e, "Unreadable scheduled_at, booking skipped");
            return Ok(None);
        }
    };

    let contact = CustomerContact {
        name: customer_name(tx),
        email: Some(tx.customer_email.clone()).filter(|e| !e.trim().is_empty()),
        phone: tx
            .customer_phone
            .clone()
            .or_else(|| tx.metadata.customer_phone.clone()),
    };
    let customer = customer::find_or_create(conn, scope, &contact).await?;

    let new_booking = NewBooking {
        tenant_id: scope.tenant_id().map(str::to_string),
        store_id: request.store_id,
        service_id: svc.id,
        customer_id: Some(customer.id),
        payment_transaction_id: Some(tx.id),
        service_title: svc.title.clone(),
        service_description: svc.description.clone(),
        duration_minutes: Some(svc.duration_minutes),
        price: svc.price,
        scheduled_at,
        status: BookingStatus::Confirmed,
        notes: request.notes.clone(),
    };

    let Some(booking_id) = booking::insert(conn, &new_booking).await? else {
        debug!(reference = %tx.reference, "Booking created concurrently");
        return Ok(None);
    };

    info!(
        reference = %tx.reference,
        booking_id,
        service_id = svc.id,
        scheduled_at = %scheduled_at,
        "Booking confirmed"
    );

    let email = customer.email.clone().map(|to| {
        PendingEmail::Booking(BookingConfirmation {
            to,
            customer_name: customer.name.clone(),
            booking_id,
            service_title: svc.title.clone(),
            scheduled_at,
            duration_minutes: effective_duration(svc.duration_minutes),
            amount_paid: tx.amount,
            reference: tx.reference.clone(),
        })
    });

    Ok(Some((booking_id, email)))
}

/// Metadata name, then the payer's name, then the email's local part.
fn customer_name(tx: &PaymentTransaction) -> String {
    tx.metadata
        .customer_name
        .clone()
        .or_else(|| tx.customer_name.clone())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            tx.customer_email
                .split('@')
                .next()
                .filter(|local| !local.is_empty())
                .unwrap_or("Customer")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookpay_core::{GatewayName, Money, PaymentMetadata, Tenant, TransactionStatus};
    use bookpay_db::{Database, DbConfig, NewService, NewTransaction};

    const TENANT: &str = "salon";

    async fn setup() -> (Database, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.tenants()
            .insert(&Tenant {
                id: TENANT.into(),
                name: "Salon".into(),
                tier: TenantTier::Shared,
                subaccount_code: None,
                is_active: true,
                contact_email: None,
            })
            .await
            .unwrap();
        let service_id = db
            .services()
            .insert(&NewService {
                tenant_id: Some(TENANT.into()),
                store_id: None,
                title: "Haircut".into(),
                description: Some("Wash and cut".into()),
                price: Money::from_major(5000),
                duration_minutes: 30,
                availability: None,
            })
            .await
            .unwrap();
        (db, service_id)
    }

    async fn transaction(db: &Database, metadata: PaymentMetadata, order_id: Option<i64>) -> PaymentTransaction {
        db.transactions()
            .insert(&NewTransaction {
                reference: format!("TXN-{}", metadata.service_id.unwrap_or(0)),
                tenant_id: Some(TENANT.into()),
                order_id,
                invoice_id: None,
                gateway_name: GatewayName::Paystack,
                gateway_transaction_id: None,
                amount: Money::from_major(5000),
                currency: "NGN".into(),
                platform_fee: Money::from_major(150),
                merchant_amount: Money::from_major(4850),
                customer_email: "ada@example.com".into(),
                customer_name: None,
                customer_phone: None,
                status: TransactionStatus::Success,
                gateway_response: None,
                metadata,
                paid_at: None,
            })
            .await
            .unwrap()
    }

    fn booking_meta(service_id: i64) -> PaymentMetadata {
        PaymentMetadata {
            tenant_id: Some(TENANT.into()),
            service_id: Some(service_id),
            scheduled_at: Some("2026-02-02T09:00:00Z".into()),
            is_booking: Some(true),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_booking_created_once() {
        let (db, service_id) = setup().await;
        let tx = transaction(&db, booking_meta(service_id), None).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let first = apply(&mut conn, &tx, Utc::now()).await.unwrap();
        let second = apply(&mut conn, &tx, Utc::now()).await.unwrap();
        drop(conn);

        let booking_id = first.booking_id.unwrap();
        assert_eq!(first.emails.len(), 1);
        assert!(second.is_empty());
        assert!(second.emails.is_empty());

        let booking = db.bookings().get_for_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(booking.id, booking_id);
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.service_title, "Haircut");
        assert_eq!(booking.duration_minutes, Some(30));
        assert_eq!(booking.scheduled_at.format("%H:%M").to_string(), "09:00");
        assert_eq!(db.bookings().count_for_transaction(tx.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_order_paid_once_with_email() {
        let (db, _) = setup().await;
        let scope = TenantScope::Tenant(TENANT.into());
        let order_id = db
            .orders()
            .insert_order(&scope, "ORD-9", None, Some("Ada"), Money::from_major(5000))
            .await
            .unwrap();
        let tx = transaction(&db, PaymentMetadata::default(), Some(order_id)).await;

        let mut conn = db.pool().acquire().await.unwrap();
        let first = apply(&mut conn, &tx, Utc::now()).await.unwrap();
        let second = apply(&mut conn, &tx, Utc::now()).await.unwrap();
        drop(conn);

        assert!(first.order_paid);
        assert!(first.booking_id.is_none());
        match &first.emails[..] {
            [PendingEmail::Order(o)] => {
                assert_eq!(o.order_number, "ORD-9");
                assert_eq!(o.to, "ada@example.com");
            }
            other => panic!("unexpected emails: {other:?}"),
        }
        assert!(!second.order_paid);
        assert!(second.emails.is_empty());
    }

    #[test]
    fn test_customer_name_precedence() {
        let mut tx = PaymentTransaction {
            id: 1,
            reference: "TXN".into(),
            tenant_id: None,
            order_id: None,
            invoice_id: None,
            gateway_name: GatewayName::Paystack,
            gateway_transaction_id: None,
            amount: Money::zero(),
            currency: "NGN".into(),
            platform_fee: Money::zero(),
            merchant_amount: Money::zero(),
            customer_email: "ada.obi@example.com".into(),
            customer_name: None,
            customer_phone: None,
            status: TransactionStatus::Success,
            gateway_response: None,
            metadata: PaymentMetadata::default(),
            failure_reason: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(customer_name(&tx), "ada.obi");

        tx.customer_name = Some("Ada Obi".into());
        assert_eq!(customer_name(&tx), "Ada Obi");

        tx.metadata.customer_name = Some("Mrs. Obi".into());
        assert_eq!(customer_name(&tx), "Mrs. Obi");
    }
}
