//! # bookpay-payments: Reconciliation Engine for Bookpay
//!
//! Drives a payment transaction from initialization to exactly-once side
//! effects, whichever of the three entry points gets there first.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payment Engine Architecture                      │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                PaymentService (entry points)                     │  │
//! │  │                                                                  │  │
//! │  │   initialize()          verify()            handle_webhook()     │  │
//! │  └──────┬───────────────────────┬──────────────────────┬────────────┘  │
//! │         │                       │                      │               │
//! │         ▼                       ▼                      ▼               │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌──────────────────────┐  │
//! │  │ BookingGuard   │  │ GatewayRegistry    │  │ signature            │  │
//! │  │                │  │                    │  │                      │  │
//! │  │ availability + │  │ Paystack           │  │ HMAC-SHA512 (hex)    │  │
//! │  │ conflict check │  │ Flutterwave        │  │ HMAC-SHA256 (base64) │  │
//! │  │ before payment │  │                    │  │ constant-time        │  │
//! │  └────────────────┘  └────────────────────┘  └──────────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   Reconciliation Applier                         │   │
//! │  │                                                                 │   │
//! │  │ order paid / invoice paid / booking + customer                  │   │
//! │  │ every write conditional, emails collected for after commit      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  COLLABORATORS: Mailer (best effort) • Clock (testable "now")          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`service`] - `PaymentService`: `initialize`, `verify`, `handle_webhook`
//! - [`booking_guard`] - Pre-payment slot check
//! - [`reconcile`] - Side effects of a first success
//! - [`gateway`] - Provider adapters, registry and webhook signatures
//! - [`config`] - Payments configuration (TOML + environment)
//! - [`mailer`] - Confirmation email collaborator
//! - [`clock`] - Source of "now"
//! - [`error`] - Engine error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookpay_payments::{GatewayRegistry, PaymentService, PaymentsConfig};
//! use bookpay_db::{Database, DbConfig};
//!
//! let config = PaymentsConfig::load(None)?;
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//! let gateways = GatewayRegistry::from_config(&config.gateways)?;
//!
//! let payments = PaymentService::new(db, gateways, &config);
//! let result = payments.verify("salon", "TXN-1700000000000-1a2b3c4d").await?;
//! println!("{} is {}", result.reference, result.status);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod booking_guard;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mailer;
pub mod reconcile;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{GatewaySettings, GatewaysSettings, PaymentsConfig};
pub use error::{ErrorKind, PaymentError, PaymentResult};
pub use gateway::{GatewayRegistry, PaymentGateway};
pub use mailer::{LogMailer, Mailer};
pub use reconcile::AppliedEffects;
pub use service::{
    InitializeRequest, InitializeResponse, PaymentService, VerificationResult, WebhookAck,
    WebhookDisposition,
};
