//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use bookpay_core::availability::{DaySchedule, WeeklySchedule};
use bookpay_core::{GatewayName, Money, PaymentOutcome, Tenant, TenantTier};
use bookpay_db::{Database, DbConfig, NewService};
use bookpay_payments::gateway::signature::hmac_sha512_hex;
use bookpay_payments::gateway::{paystack, InitRequest, InitResponse, VerifyResponse, WebhookEvent};
use bookpay_payments::mailer::{BookingConfirmation, MailError, OrderConfirmation};
use bookpay_payments::{
    FixedClock, GatewayRegistry, InitializeRequest, Mailer, PaymentError, PaymentGateway,
    PaymentResult, PaymentService, PaymentsConfig,
};

pub const TENANT: &str = "salon";
pub const WEBHOOK_SECRET: &str = "sk_test_secret";

/// Sunday 2026-02-01 08:00, the day before the Monday slots.
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

pub fn monday_at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 2)
        .unwrap()
        .and_hms_opt(h, m, 0)
        .unwrap()
}

// =============================================================================
// Scripted Gateway
// =============================================================================

/// Paystack-shaped gateway whose provider answers are scripted by the test.
///
/// Webhooks go through the real Paystack signature check and parser.
#[derive(Default)]
pub struct ScriptedGateway {
    verify_answers: Mutex<HashMap<String, VerifyResponse>>,
    initialized: Mutex<Vec<InitRequest>>,
    verify_calls: Mutex<usize>,
    fail_initialize: Mutex<bool>,
}

impl ScriptedGateway {
    pub fn answer_verify(&self, reference: &str, outcome: PaymentOutcome, amount: Option<Money>) {
        self.verify_answers.lock().unwrap().insert(
            reference.to_string(),
            VerifyResponse {
                outcome,
                amount,
                paid_at: None,
                provider_transaction_id: Some("4099260516".into()),
                raw: json!({"status": "success", "reference": reference}),
            },
        );
    }

    pub fn fail_next_initialize(&self) {
        *self.fail_initialize.lock().unwrap() = true;
    }

    pub fn verify_calls(&self) -> usize {
        *self.verify_calls.lock().unwrap()
    }

    /// Metadata sent to the provider for `reference`, as the provider echoes it.
    pub fn echoed_metadata(&self, reference: &str) -> Value {
        let initialized = self.initialized.lock().unwrap();
        let request = initialized
            .iter()
            .find(|r| r.reference == reference)
            .expect("reference was never initialized");
        serde_json::to_value(&request.metadata).unwrap()
    }

    pub fn initialized(&self) -> Vec<InitRequest> {
        self.initialized.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn name(&self) -> GatewayName {
        GatewayName::Paystack
    }

    async fn initialize(&self, request: &InitRequest) -> PaymentResult<InitResponse> {
        if std::mem::take(&mut *self.fail_initialize.lock().unwrap()) {
            return Err(PaymentError::gateway(GatewayName::Paystack, "connection reset"));
        }
        self.initialized.lock().unwrap().push(request.clone());
        Ok(InitResponse {
            authorization_url: format!("https://checkout.test/{}", request.reference),
            provider_reference: Some(format!("access_{}", request.reference)),
            raw: json!({"status": true}),
        })
    }

    async fn verify(&self, reference: &str) -> PaymentResult<VerifyResponse> {
        *self.verify_calls.lock().unwrap() += 1;
        let answer = self.verify_answers.lock().unwrap().get(reference).cloned();
        Ok(answer.unwrap_or(VerifyResponse {
            outcome: PaymentOutcome::Pending,
            amount: None,
            paid_at: None,
            provider_transaction_id: None,
            raw: json!({"status": "ongoing"}),
        }))
    }

    fn verify_webhook(&self, body: &[u8], signature: Option<&str>) -> PaymentResult<()> {
        bookpay_payments::gateway::signature::verify_paystack(WEBHOOK_SECRET, body, signature)
    }

    fn parse_webhook(&self, body: &[u8]) -> PaymentResult<WebhookEvent> {
        paystack::parse_webhook(body)
    }
}

// =============================================================================
// Recording Mailer
// =============================================================================

#[derive(Default)]
pub struct RecordingMailer {
    pub orders: Mutex<Vec<OrderConfirmation>>,
    pub bookings: Mutex<Vec<BookingConfirmation>>,
}

impl RecordingMailer {
    pub fn order_count(&self) -> usize {
        self.orders.lock().unwrap().len()
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_order_confirmation(&self, email: &OrderConfirmation) -> Result<(), MailError> {
        self.orders.lock().unwrap().push(email.clone());
        Ok(())
    }

    async fn send_booking_confirmation(
        &self,
        email: &BookingConfirmation,
    ) -> Result<(), MailError> {
        self.bookings.lock().unwrap().push(email.clone());
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub payments: PaymentService,
    pub db: Database,
    pub gateway: Arc<ScriptedGateway>,
    pub mailer: Arc<RecordingMailer>,
    /// 30-minute service with Monday slots at 09:00, 09:30 and 10:00.
    pub service_id: i64,
}

impl Harness {
    pub async fn in_memory() -> Self {
        Self::with_db(Database::new(DbConfig::in_memory()).await.unwrap()).await
    }

    /// File-backed database with several pooled connections.
    pub async fn on_disk(dir: &Path) -> Self {
        let config = DbConfig::new(dir.join("bookpay.db")).max_connections(4);
        Self::with_db(Database::new(config).await.unwrap()).await
    }

    async fn with_db(db: Database) -> Self {
        db.tenants()
            .insert(&Tenant {
                id: TENANT.into(),
                name: "Glow Salon".into(),
                tier: TenantTier::Shared,
                subaccount_code: Some("ACCT_salon".into()),
                is_active: true,
                contact_email: Some("owner@glow.test".into()),
            })
            .await
            .unwrap();

        let mut days = BTreeMap::new();
        days.insert(
            "monday".to_string(),
            DaySchedule {
                available: true,
                time_slots: vec!["09:00".into(), "09:30".into(), "10:00".into()],
            },
        );
        let service_id = db
            .services()
            .insert(&NewService {
                tenant_id: Some(TENANT.into()),
                store_id: None,
                title: "Haircut".into(),
                description: Some("Wash, cut and style".into()),
                price: Money::from_major(5000),
                duration_minutes: 30,
                availability: Some(WeeklySchedule(days)),
            })
            .await
            .unwrap();

        let gateway = Arc::new(ScriptedGateway::default());
        let mailer = Arc::new(RecordingMailer::default());

        let mut registry = GatewayRegistry::new();
        registry.register(gateway.clone(), true);

        let payments = PaymentService::new(db.clone(), registry, &PaymentsConfig::default())
            .with_mailer(mailer.clone())
            .with_clock(Arc::new(FixedClock::at(now())));

        Harness {
            payments,
            db,
            gateway,
            mailer,
            service_id,
        }
    }

    /// A 5000.00 booking payment for `scheduled_at`.
    pub fn booking_request(&self, scheduled_at: &str) -> InitializeRequest {
        let metadata = serde_json::from_value(json!({
            "service_id": self.service_id,
            "scheduled_at": scheduled_at,
            "is_booking": true,
        }))
        .unwrap();
        InitializeRequest {
            tenant_id: Some(TENANT.into()),
            amount: Some(Decimal::from(5000)),
            email: Some("a@b.com".into()),
            name: Some("Ada Obi".into()),
            metadata,
            ..Default::default()
        }
    }
}

// =============================================================================
// Webhook Bodies
// =============================================================================

/// A signed Paystack `charge.success` body.
pub fn charge_success(reference: &str, amount: Money, metadata: Value) -> (Vec<u8>, String) {
    let body = json!({
        "event": "charge.success",
        "data": {
            "id": 4099260516u64,
            "status": "success",
            "reference": reference,
            "amount": amount.minor(),
            "currency": "NGN",
            "paid_at": "2026-02-01T08:05:00.000Z",
            "metadata": metadata,
            "customer": {
                "email": "a@b.com",
                "first_name": "Ada",
                "last_name": "Obi",
                "phone": "+2348000000000"
            }
        }
    });
    sign(&body)
}

pub fn sign(body: &Value) -> (Vec<u8>, String) {
    let bytes = serde_json::to_vec(body).unwrap();
    let signature = hmac_sha512_hex(WEBHOOK_SECRET, &bytes).unwrap();
    (bytes, signature)
}
