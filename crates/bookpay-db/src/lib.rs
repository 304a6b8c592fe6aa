//! # bookpay-db: Database Layer for Bookpay
//!
//! SQLite access for the reconciliation engine, through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bookpay Data Flow                                │
//! │                                                                         │
//! │  PaymentService::verify / handle_webhook                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     bookpay-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ transaction.rs │    │  (embedded)  │  │   │
//! │  │   │               │    │ booking.rs     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ service.rs     │    │ 001_initial  │  │   │
//! │  │   │ UnitOfWork    │    │ customer.rs    │    │  _schema.sql │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (WAL)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookpay_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bookpay.db")).await?;
//!
//! let mut uow = db.begin().await?;
//! let tx = bookpay_db::repository::transaction::lock_by_reference(
//!     uow.conn(), &scope, "TXN-1700000000000-1a2b3c4d",
//! ).await?;
//! uow.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use unit_of_work::UnitOfWork;

pub use repository::booking::{BookingRepository, NewBooking};
pub use repository::customer::{CustomerContact, CustomerRepository};
pub use repository::order::OrderRepository;
pub use repository::service::{NewAvailabilitySlot, NewService, ServiceRepository};
pub use repository::tenant::TenantRepository;
pub use repository::transaction::{NewTransaction, StatusUpdate, TransactionRepository};
