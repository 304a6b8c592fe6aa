//! verify and webhook racing on the same reference.
//!
//! Runs on a file-backed database so the two paths hold separate pooled
//! connections and really contend for the row.

mod common;

use bookpay_core::{GatewayName, Money, PaymentOutcome, TenantScope, TransactionStatus};
use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_verify_and_webhook_race_settles_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::on_disk(dir.path()).await;
    let scope = TenantScope::Tenant(TENANT.into());

    for slot in ["2026-02-02T09:00:00", "2026-02-02T09:30:00", "2026-02-02T10:00:00"] {
        let started = h.payments.initialize(h.booking_request(slot)).await.unwrap();
        let reference = started.transaction_reference;
        h.gateway
            .answer_verify(&reference, PaymentOutcome::Success, Some(Money::from_major(5000)));
        let (body, signature) = charge_success(
            &reference,
            Money::from_major(5000),
            h.gateway.echoed_metadata(&reference),
        );

        let verify = {
            let payments = h.payments.clone();
            let reference = reference.clone();
            tokio::spawn(async move { payments.verify(TENANT, &reference).await })
        };
        let webhook = {
            let payments = h.payments.clone();
            tokio::spawn(async move {
                payments
                    .handle_webhook(GatewayName::Paystack, &body, Some(&signature))
                    .await
            })
        };

        let verified = verify.await.unwrap().unwrap();
        let ack = webhook.await.unwrap().unwrap();
        assert!(ack.received);
        assert_eq!(verified.status, TransactionStatus::Success);

        let tx = h
            .db
            .transactions()
            .get_by_reference(&scope, &reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(h.db.bookings().count_for_transaction(tx.id).await.unwrap(), 1);
    }

    // One confirmation per payment, whichever path applied it.
    assert_eq!(h.mailer.booking_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_webhooks_race_settles_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::on_disk(dir.path()).await;

    let started = h
        .payments
        .initialize(h.booking_request("2026-02-02T09:00:00"))
        .await
        .unwrap();
    let reference = started.transaction_reference;
    let (body, signature) = charge_success(
        &reference,
        Money::from_major(5000),
        h.gateway.echoed_metadata(&reference),
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let payments = h.payments.clone();
            let body = body.clone();
            let signature = signature.clone();
            tokio::spawn(async move {
                payments
                    .handle_webhook(GatewayName::Paystack, &body, Some(&signature))
                    .await
            })
        })
        .collect();

    let mut succeeded = 0;
    for handle in handles {
        let ack = handle.await.unwrap().unwrap();
        if ack.disposition == bookpay_payments::WebhookDisposition::Succeeded {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 1);

    let tx = h
        .db
        .transactions()
        .find_by_reference(&reference)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.db.bookings().count_for_transaction(tx.id).await.unwrap(), 1);
    assert_eq!(h.mailer.booking_count(), 1);
}
