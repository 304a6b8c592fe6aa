//! # Conflict Detector
//!
//! Checks a candidate booking window against the bookings that already hold
//! a slot on the same service and day.
//!
//! ## Overlap Rule
//! ```text
//!   existing:      |=========|
//!   candidate:          |=========|      start < e.end && end > e.start → CONFLICT
//!
//!   existing:      |=========|
//!   candidate:               |=========| touching at the boundary → OK
//! ```
//!
//! Loading the same-day bookings is the caller's job (bookpay-db); this module
//! only decides.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::availability::effective_duration;
use crate::error::SlotRejection;
use crate::types::Booking;

/// A half-open interval `[start, end)` of local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        TimeWindow { start, end }
    }

    /// Window starting at `start` and lasting `minutes`.
    pub fn starting_at(start: NaiveDateTime, minutes: i64) -> Self {
        TimeWindow {
            start,
            end: start + Duration::minutes(minutes),
        }
    }

    /// Strict overlap: windows that only touch do not overlap.
    #[inline]
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// True when `instant` lies inside the window (both ends inclusive).
    ///
    /// Inline schedules synthesize `[first slot, last slot]`, so the last
    /// slot start itself must count as contained.
    #[inline]
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Returns true if `candidate` overlaps any slot-holding booking.
///
/// Bookings without a stored duration are assumed to last
/// `service_duration_minutes`. Cancelled, completed and no-show bookings are
/// ignored even if the caller passes them in.
pub fn has_conflict(
    candidate: &TimeWindow,
    existing: &[Booking],
    service_duration_minutes: i64,
) -> bool {
    existing
        .iter()
        .filter(|b| b.status.blocks_slot())
        .any(|b| {
            let minutes = b
                .duration_minutes
                .filter(|d| *d > 0)
                .unwrap_or_else(|| effective_duration(service_duration_minutes));
            candidate.overlaps(&TimeWindow::starting_at(b.scheduled_at, minutes))
        })
}

/// [`has_conflict`] as a guard for `?` chains.
pub fn ensure_free(
    candidate: &TimeWindow,
    existing: &[Booking],
    service_duration_minutes: i64,
) -> Result<(), SlotRejection> {
    if has_conflict(candidate, existing, service_duration_minutes) {
        Err(SlotRejection::AlreadyBooked)
    } else {
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
