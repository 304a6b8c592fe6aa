//! # bookpay-core: Pure Business Logic for Bookpay
//!
//! The rules of payment-triggered booking, as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bookpay Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 payments-api (axum)                              │   │
//! │  │     /initialize      /verify      /webhooks/{provider}          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 bookpay-payments (engine)                        │   │
//! │  │     gateways, state machine entry points, reconciliation         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bookpay-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │  ┌─────────────┐ ┌──────────┐ ┌────────┐ ┌─────────────┐       │   │
//! │  │  │availability │ │ conflict │ │  fees  │ │ transaction │       │   │
//! │  │  │  resolve()  │ │ overlap  │ │  cap   │ │   rules     │       │   │
//! │  │  └─────────────┘ └──────────┘ └────────┘ └─────────────┘       │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK READS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 bookpay-db (SQLite, sqlx)                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (PaymentTransaction, Booking, Tenant, ...)
//! - [`money`] - Money in minor units
//! - [`availability`] - Availability Resolver (inline JSON or relational slots)
//! - [`conflict`] - Conflict Detector
//! - [`fees`] - Fee Calculator and split instructions
//! - [`transaction`] - Reference generation and transition rules
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use bookpay_core::fees::compute_fee;
//! use bookpay_core::{FeeRate, Money};
//!
//! let fee = compute_fee(Money::from_major(1_000), FeeRate::from_bps(300));
//! assert_eq!(fee.platform_fee, Money::from_major(30));
//! assert_eq!(fee.merchant_amount, Money::from_major(970));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod conflict;
pub mod error;
pub mod fees;
pub mod money;
pub mod transaction;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use availability::{AvailabilitySource, SlotWindow, WeeklySchedule};
pub use conflict::TimeWindow;
pub use error::{CoreError, CoreResult, SlotRejection, ValidationError};
pub use fees::{FeeBreakdown, SplitInstruction};
pub use money::Money;
pub use transaction::{PaymentOutcome, Transition};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Ceiling on the platform fee for a single payment (500.00 major units).
///
/// ## Business Reason
/// Large bookings would otherwise pay a disproportionate platform cut.
pub const FEE_CAP: Money = Money::from_major(500);

/// Default platform fee rate for shared-tier tenants (3%).
pub const DEFAULT_PLATFORM_FEE: FeeRate = FeeRate::from_bps(300);

/// Currency used when the caller does not name one.
pub const DEFAULT_CURRENCY: &str = "NGN";
