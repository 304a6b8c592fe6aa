//! # Payment Service
//!
//! The three entry points of the transaction state machine.
//!
//! ## Entry Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  initialize ──► booking guard ──► fees ──► INSERT pending ──► provider  │
//! │                                                                         │
//! │  verify ─────► provider ──► BEGIN ─► lock row ─► plan ─► UPDATE         │
//! │                                        │                   │            │
//! │                                        │        first success?          │
//! │                                        │                   ▼            │
//! │                                        │            reconcile::apply    │
//! │                                        ▼                   │            │
//! │                                  already success?       COMMIT          │
//! │                                  (lost the race)           │            │
//! │                                                       send emails       │
//! │                                                                         │
//! │  webhook ────► signature ──► parse ──► (reconstruct row) ──►            │
//! │                 UPDATE ... WHERE status = 'pending' ──► won?            │
//! │                                                   ▼                     │
//! │                                        reconcile::apply (idempotent)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the verify path holds the row lock. The webhook path relies on the
//! conditional updates inside every write.

mod initialize;
mod verify;
mod webhook;

pub use initialize::{InitializeRequest, InitializeResponse};
pub use verify::VerificationResult;
pub use webhook::{WebhookAck, WebhookDisposition};

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{FeeSettings, PaymentsConfig};
use crate::error::{PaymentError, PaymentResult};
use crate::gateway::GatewayRegistry;
use crate::mailer::{LogMailer, Mailer};
use bookpay_core::Tenant;
use bookpay_db::Database;

/// Payment engine shared by every request.
#[derive(Clone)]
pub struct PaymentService {
    db: Database,
    gateways: GatewayRegistry,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    fees: FeeSettings,
    default_callback_url: Option<String>,
}

impl std::fmt::Debug for PaymentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("gateways", &self.gateways)
            .field("fees", &self.fees)
            .finish_non_exhaustive()
    }
}

impl PaymentService {
    /// Creates the engine with a logging mailer and the system clock.
    pub fn new(db: Database, gateways: GatewayRegistry, config: &PaymentsConfig) -> Self {
        PaymentService {
            db,
            gateways,
            mailer: Arc::new(LogMailer),
            clock: Arc::new(SystemClock),
            fees: config.fees.clone(),
            default_callback_url: config.app.callback_url.clone(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn gateways(&self) -> &GatewayRegistry {
        &self.gateways
    }

    /// Loads an active tenant; inactive tenants are treated as missing.
    async fn active_tenant(&self, tenant_id: &str) -> PaymentResult<Tenant> {
        self.db
            .tenants()
            .get(tenant_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or_else(|| PaymentError::TenantNotFound(tenant_id.to_string()))
    }
}
