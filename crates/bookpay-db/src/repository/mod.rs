//! # Repository Module
//!
//! Database repository implementations for Bookpay.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool-backed repository struct         Connection-level function       │
//! │  ─────────────────────────────         ─────────────────────────       │
//! │  db.transactions()                     transaction::lock_by_reference  │
//! │    .get_by_reference(&scope, r)          (uow.conn(), &scope, r)       │
//! │                                                                         │
//! │  one pooled connection per call        runs on the caller's            │
//! │  (reads, seed data, tests)             UnitOfWork connection           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything inside a critical section goes through the connection-level
//! functions, so a held lock is never waited on by its own holder.
//!
//! ## Available Repositories
//!
//! - [`TenantRepository`](tenant::TenantRepository) - Tenant lookup
//! - [`ServiceRepository`](service::ServiceRepository) - Services and availability rows
//! - [`BookingRepository`](booking::BookingRepository) - Bookings and same-day lookups
//! - [`CustomerRepository`](customer::CustomerRepository) - Idempotent customer resolution
//! - [`OrderRepository`](order::OrderRepository) - Orders and invoices
//! - [`TransactionRepository`](transaction::TransactionRepository) - Payment transactions

pub mod booking;
pub mod customer;
pub mod order;
pub mod service;
pub mod tenant;
pub mod transaction;
