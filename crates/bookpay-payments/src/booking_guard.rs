//! # Booking Guard
//!
//! Pre-payment slot check run by `initialize` before any transaction row
//! exists.
//!
//! ```text
//! store_id? ──► scheduled_at ──► parse ──► service ──► AvailabilitySource ──► resolve
//!                                                                                 │
//!                                    same-day pending/confirmed bookings ──► ensure_free
//! ```
//!
//! The check is advisory: nothing is reserved, and the post-payment booking
//! insert does not repeat the overlap test.

use chrono::{Datelike, NaiveDateTime};
use tracing::debug;

use crate::error::{PaymentError, PaymentResult};
use bookpay_core::availability::{effective_duration, parse_scheduled_at, resolve};
use bookpay_core::conflict::ensure_free;
use bookpay_core::{BookingRequest, Service, Tenant, TimeWindow, ValidationError};
use bookpay_db::Database;

/// A slot that passed both checks.
#[derive(Debug, Clone)]
pub struct ApprovedSlot {
    pub service: Service,
    pub scheduled_at: NaiveDateTime,
    /// The appointment itself: `[start, start + duration)`.
    pub appointment: TimeWindow,
    /// The availability window the start was matched against.
    pub availability: TimeWindow,
}

/// Checks that `request` names a bookable, unoccupied slot.
///
/// Tenants outside the shared tier must name the store the booking is for.
pub async fn check(
    db: &Database,
    tenant: &Tenant,
    request: &BookingRequest,
    now: NaiveDateTime,
) -> PaymentResult<ApprovedSlot> {
    if request.store_id.is_none() && tenant.requires_store_for_booking() {
        return Err(ValidationError::required("store_id").into());
    }
    let requested = parse_scheduled_at(&request.scheduled_at)?;
    let scope = &tenant.scope();

    let service = db
        .services()
        .get(scope, request.service_id)
        .await?
        .ok_or(PaymentError::ServiceNotFound(request.service_id))?;

    let source = db
        .services()
        .availability_for(scope, &service, request.store_id, requested.weekday())
        .await?;
    let slot = resolve(&source, service.duration_minutes, requested, now)?;

    let appointment =
        TimeWindow::starting_at(slot.requested, effective_duration(service.duration_minutes));
    let existing = db
        .bookings()
        .blocking_on_day(scope, service.id, request.store_id, slot.requested.date())
        .await?;
    ensure_free(&appointment, &existing, service.duration_minutes)?;

    debug!(
        service_id = service.id,
        scheduled_at = %slot.requested,
        same_day = existing.len(),
        "Booking slot approved"
    );

    Ok(ApprovedSlot {
        service,
        scheduled_at: slot.requested,
        appointment,
        availability: slot.window,
    })
}
