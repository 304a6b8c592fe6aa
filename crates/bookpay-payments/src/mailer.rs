//! # Mailer
//!
//! Confirmation emails sent after a payment settles.
//!
//! Delivery is best-effort: [`dispatch`] logs every failure and never
//! returns one. The reconciliation step only *collects* [`PendingEmail`]s;
//! they are sent after the unit of work commits, so a rollback never
//! produces an email.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::{info, warn};

use bookpay_core::Money;

/// A mail backend failure.
#[derive(Debug, Error)]
#[error("Mail delivery failed: {0}")]
pub struct MailError(pub String);

/// Order confirmation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation {
    pub to: String,
    pub customer_name: Option<String>,
    pub order_number: String,
    pub total: Money,
    pub reference: String,
}

/// Booking confirmation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingConfirmation {
    pub to: String,
    pub customer_name: String,
    pub booking_id: i64,
    pub service_title: String,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i64,
    pub amount_paid: Money,
    pub reference: String,
}

/// An email queued by the reconciliation step.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingEmail {
    Order(OrderConfirmation),
    Booking(BookingConfirmation),
}

/// Email collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_order_confirmation(&self, email: &OrderConfirmation) -> Result<(), MailError>;

    async fn send_booking_confirmation(&self, email: &BookingConfirmation)
        -> Result<(), MailError>;
}

/// Sends every queued email, logging failures.
pub async fn dispatch(mailer: &dyn Mailer, emails: Vec<PendingEmail>) {
    for email in emails {
        let result = match &email {
            PendingEmail::Order(order) => mailer.send_order_confirmation(order).await,
            PendingEmail::Booking(booking) => mailer.send_booking_confirmation(booking).await,
        };
        if let Err(e) = result {
            match &email {
                PendingEmail::Order(o) => {
                    warn!(error = %e, order = %o.order_number, to = %o.to, "Order confirmation email failed")
                }
                PendingEmail::Booking(b) => {
                    warn!(error = %e, booking_id = b.booking_id, to = %b.to, "Booking confirmation email failed")
                }
            }
        }
    }
}

/// Writes emails to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_order_confirmation(&self, email: &OrderConfirmation) -> Result<(), MailError> {
        info!(
            to = %email.to,
            order = %email.order_number,
            total = %email.total,
            reference = %email.reference,
            "Order confirmation"
        );
        Ok(())
    }

    async fn send_booking_confirmation(
        &self,
        email: &BookingConfirmation,
    ) -> Result<(), MailError> {
        info!(
            to = %email.to,
            booking_id = email.booking_id,
            service = %email.service_title,
            scheduled_at = %email.scheduled_at,
            reference = %email.reference,
            "Booking confirmation"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails order emails, records booking emails.
    #[derive(Default)]
    struct FlakyMailer {
        delivered: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl Mailer for FlakyMailer {
        async fn send_order_confirmation(&self, _: &OrderConfirmation) -> Result<(), MailError> {
            Err(MailError("smtp down".into()))
        }

        async fn send_booking_confirmation(
            &self,
            email: &BookingConfirmation,
        ) -> Result<(), MailError> {
            self.delivered.lock().unwrap().push(email.booking_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dispatch_continues_after_failure() {
        let mailer = FlakyMailer::default();
        let at = chrono::NaiveDate::from_ymd_opt(2026, 2, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();

        dispatch(
            &mailer,
            vec![
                PendingEmail::Order(OrderConfirmation {
                    to: "a@b.com".into(),
                    customer_name: None,
                    order_number: "ORD-1".into(),
                    total: Money::from_major(10),
                    reference: "TXN-1".into(),
                }),
                PendingEmail::Booking(BookingConfirmation {
                    to: "a@b.com".into(),
                    customer_name: "A".into(),
                    booking_id: 42,
                    service_title: "Haircut".into(),
                    scheduled_at: at,
                    duration_minutes: 30,
                    amount_paid: Money::from_major(10),
                    reference: "TXN-1".into(),
                }),
            ],
        )
        .await;

        assert_eq!(*mailer.delivered.lock().unwrap(), vec![42]);
    }
}
