//! # Availability Resolver
//!
//! Decides whether a requested instant is bookable for a service.
//!
//! ## Two Sources, One Entry Point
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  AvailabilitySource (chosen once)                       │
//! │                                                                         │
//! │  Inline(WeeklySchedule)                 Relational(Vec<AvailabilitySlot>)│
//! │  ──────────────────────                 ──────────────────────────────── │
//! │  {"monday": {                           service_id | dow | 09:00 | 17:00 │
//! │     "available": true,                  service_id | dow | 13:00 | 15:00 │
//! │     "time_slots": ["09:00","09:30"]}}                                    │
//! │                                                                         │
//! │  time must appear verbatim               time must fall in [start, end)  │
//! │  window = [min slot, max slot]           and be start + k × duration     │
//! │                                          with start + duration <= end    │
//! │                                                                         │
//! │                     resolve(source, ...) → SlotWindow                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The inline schedule wins whenever it has an entry for the weekday, even
//! one marked unavailable or with no slots: such a day is closed and the
//! relational rows cannot reopen it. Only a weekday missing from the inline
//! schedule falls back to the relational rows. Callers pick the source with
//! [`WeeklySchedule::covers`] and never branch on representation again.
//!
//! ## Wall-Clock Policy
//! Slot tables store local wall-clock strings. A requested instant with a
//! `Z` (or numeric offset) suffix keeps its clock fields as written: the
//! suffix is dropped, not converted.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::conflict::TimeWindow;
use crate::error::SlotRejection;

/// Duration used when a service has no positive duration configured.
pub const DEFAULT_DURATION_MINUTES: i64 = 60;

// =============================================================================
// Inline Schedule
// =============================================================================

/// One weekday of an inline schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    #[serde(default)]
    pub available: bool,
    /// Slot START times as `HH:MM` strings.
    #[serde(default)]
    pub time_slots: Vec<String>,
}

/// Weekly schedule keyed by day name (`"monday"`, `"Tuesday"`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklySchedule(pub BTreeMap<String, DaySchedule>);

impl WeeklySchedule {
    /// Returns the entry for a weekday, matching day names case-insensitively.
    pub fn day(&self, weekday: Weekday) -> Option<&DaySchedule> {
        let wanted = weekday_name(weekday);
        self.0
            .iter()
            .find(|(name, _)| name.trim().eq_ignore_ascii_case(wanted))
            .map(|(_, day)| day)
    }

    /// True when this schedule is authoritative for the weekday, i.e. it has
    /// an entry for it. Whether that entry is open is for [`resolve`].
    pub fn covers(&self, weekday: Weekday) -> bool {
        self.day(weekday).is_some()
    }
}

// =============================================================================
// Relational Slots
// =============================================================================

/// A weekly availability row for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub id: i64,
    pub service_id: i64,
    /// 0 = Sunday ... 6 = Saturday.
    pub day_of_week: u32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

// =============================================================================
// Source & Result
// =============================================================================

/// Where availability for one lookup comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AvailabilitySource {
    Inline(WeeklySchedule),
    Relational(Vec<AvailabilitySlot>),
}

/// A successful resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotWindow {
    /// The requested start, normalized to minute precision.
    pub requested: NaiveDateTime,
    /// The canonical window the start belongs to.
    pub window: TimeWindow,
}

// =============================================================================
// Parsing
// =============================================================================

/// Parses a caller-supplied `scheduled_at` into local wall-clock time.
///
/// Accepts `YYYY-MM-DDTHH:MM[:SS[.fff]]` (or a space instead of `T`) with an
/// optional `Z` / `±HH:MM` suffix that is dropped. Seconds are truncated.
///
/// ```rust
/// use bookpay_core::availability::parse_scheduled_at;
///
/// let a = parse_scheduled_at("2026-02-02T09:00:00Z").unwrap();
/// let b = parse_scheduled_at("2026-02-02 09:00").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_scheduled_at(raw: &str) -> Result<NaiveDateTime, SlotRejection> {
    let trimmed = raw.trim();
    let local_part = strip_zone_suffix(trimmed);

    const FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(local_part, fmt).ok())
        .map(truncate_to_minute)
        .ok_or_else(|| SlotRejection::InvalidFormat(raw.to_string()))
}

/// Drops a trailing `Z` or `±HH:MM` / `±HHMM` zone designator.
fn strip_zone_suffix(s: &str) -> &str {
    if let Some(stripped) = s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        return stripped;
    }
    // Only look after the time separator so the date's dashes are left alone.
    let Some(t_pos) = s.find(['T', ' ']) else {
        return s;
    };
    match s[t_pos..].rfind(['+', '-']) {
        Some(rel) => &s[..t_pos + rel],
        None => s,
    }
}

fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(dt)
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolves a requested start against a service's availability.
///
/// ## Order of Checks
/// 1. previous calendar year → [`SlotRejection::PreviousYear`]
/// 2. before `now` (minute granularity) → [`SlotRejection::InPast`]
/// 3. source-specific rules (see module docs)
///
/// `now` is local wall-clock time supplied by the caller.
pub fn resolve(
    source: &AvailabilitySource,
    duration_minutes: i64,
    requested: NaiveDateTime,
    now: NaiveDateTime,
) -> Result<SlotWindow, SlotRejection> {
    let requested = truncate_to_minute(requested);
    let now = truncate_to_minute(now);

    if requested.year() < now.year() {
        return Err(SlotRejection::PreviousYear);
    }
    if requested < now {
        return Err(SlotRejection::InPast);
    }

    match source {
        AvailabilitySource::Inline(schedule) => resolve_inline(schedule, requested),
        AvailabilitySource::Relational(slots) => {
            resolve_relational(slots, effective_duration(duration_minutes), requested)
        }
    }
}

/// Falls back to [`DEFAULT_DURATION_MINUTES`] for non-positive durations.
pub fn effective_duration(duration_minutes: i64) -> i64 {
    if duration_minutes > 0 {
        duration_minutes
    } else {
        DEFAULT_DURATION_MINUTES
    }
}

fn resolve_inline(
    schedule: &WeeklySchedule,
    requested: NaiveDateTime,
) -> Result<SlotWindow, SlotRejection> {
    let weekday = requested.weekday();
    // An open day without slots has no bookable start.
    let day = schedule
        .day(weekday)
        .filter(|d| d.available && !d.time_slots.is_empty())
        .ok_or_else(|| SlotRejection::NoAvailability {
            weekday: display_weekday(weekday),
        })?;

    let wanted = requested.format("%H:%M").to_string();
    if !day.time_slots.iter().any(|slot| slot.trim() == wanted) {
        return Err(SlotRejection::OutsideWindow { time: wanted });
    }

    // The requested slot parses, so min/max always exist here.
    let parsed: Vec<NaiveTime> = day
        .time_slots
        .iter()
        .filter_map(|s| NaiveTime::parse_from_str(s.trim(), "%H:%M").ok())
        .collect();
    let first = parsed.iter().min().copied().unwrap_or(requested.time());
    let last = parsed.iter().max().copied().unwrap_or(requested.time());

    let date = requested.date();
    Ok(SlotWindow {
        requested,
        window: TimeWindow::new(date.and_time(first), date.and_time(last)),
    })
}

fn resolve_relational(
    slots: &[AvailabilitySlot],
    duration_minutes: i64,
    requested: NaiveDateTime,
) -> Result<SlotWindow, SlotRejection> {
    let weekday = requested.weekday();
    let dow = weekday.num_days_from_sunday();

    let mut rows: Vec<&AvailabilitySlot> = slots
        .iter()
        .filter(|s| s.is_available && s.day_of_week == dow)
        .collect();
    if rows.is_empty() {
        return Err(SlotRejection::NoAvailability {
            weekday: display_weekday(weekday),
        });
    }
    rows.sort_by_key(|s| s.start_time);

    let time = requested.time();
    let label = requested.format("%H:%M").to_string();
    let containing: Vec<&AvailabilitySlot> = rows
        .into_iter()
        .filter(|s| s.start_time <= time && time < s.end_time)
        .collect();
    if containing.is_empty() {
        return Err(SlotRejection::OutsideWindow { time: label });
    }

    // Rows may overlap; any row the start aligns to will do.
    let step = Duration::minutes(duration_minutes);
    containing
        .into_iter()
        .find_map(|row| aligned_slot(row, step, requested))
        .ok_or(SlotRejection::NotSlotStart { time: label })
}

/// Steps through `row` by `step` looking for a slot that starts exactly at
/// `requested` and ends inside the row.
fn aligned_slot(
    row: &AvailabilitySlot,
    step: Duration,
    requested: NaiveDateTime,
) -> Option<SlotWindow> {
    let date = requested.date();
    let window_end = date.and_time(row.end_time);

    let mut cursor = date.and_time(row.start_time);
    while cursor < window_end && cursor <= requested {
        if cursor == requested {
            let slot_end = cursor + step;
            return (slot_end <= window_end).then(|| SlotWindow {
                requested,
                window: TimeWindow::new(cursor, slot_end),
            });
        }
        cursor += step;
    }
    None
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

fn display_weekday(weekday: Weekday) -> String {
    let name = weekday_name(weekday);
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn monday_schedule(slots: &[&str]) -> WeeklySchedule {
        let mut map = BTreeMap::new();
        map.insert(
            "Monday".to_string(),
            DaySchedule {
                available: true,
                time_slots: slots.iter().map(|s| s.to_string()).collect(),
            },
        );
        map.insert(
            "tuesday".to_string(),
            DaySchedule {
                available: false,
                time_slots: vec!["09:00".into()],
            },
        );
        WeeklySchedule(map)
    }

    fn monday_row(start: NaiveTime, end: NaiveTime) -> AvailabilitySlot {
        AvailabilitySlot {
            id: 1,
            service_id: 7,
            day_of_week: 1,
            start_time: start,
            end_time: end,
            is_available: true,
        }
    }

    // 2026-02-02 is a Monday.
    fn now() -> NaiveDateTime {
        at(2026, 1, 15, 12, 0)
    }

    #[test]
    fn test_parse_drops_zone_suffix() {
        let expected = at(2026, 2, 2, 9, 0);
        assert_eq!(parse_scheduled_at("2026-02-02T09:00:00Z").unwrap(), expected);
        assert_eq!(parse_scheduled_at("2026-02-02T09:00:00.000Z").unwrap(), expected);
        assert_eq!(parse_scheduled_at("2026-02-02T09:00:00+01:00").unwrap(), expected);
        assert_eq!(parse_scheduled_at("2026-02-02T09:00:45").unwrap(), expected);
        assert_eq!(parse_scheduled_at("2026-02-02 09:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_scheduled_at("next monday"),
            Err(SlotRejection::InvalidFormat(_))
        ));
        assert!(parse_scheduled_at("2026-02-02").is_err());
    }

    #[test]
    fn test_schedule_covers() {
        let schedule = monday_schedule(&["09:00"]);
        assert!(schedule.covers(Weekday::Mon));
        assert!(schedule.covers(Weekday::Tue)); // closed, but still authoritative
        assert!(!schedule.covers(Weekday::Wed)); // missing
        assert!(monday_schedule(&[]).covers(Weekday::Mon)); // no slots
    }

    #[test]
    fn test_inline_closed_day_has_no_availability() {
        let source = AvailabilitySource::Inline(monday_schedule(&[]));

        // 2026-02-03 is a Tuesday, listed with available = false
        assert_eq!(
            resolve(&source, 30, at(2026, 2, 3, 9, 0), now()).unwrap_err(),
            SlotRejection::NoAvailability { weekday: "Tuesday".into() }
        );
        // Monday is open but lists no starts
        assert_eq!(
            resolve(&source, 30, at(2026, 2, 2, 9, 0), now()).unwrap_err(),
            SlotRejection::NoAvailability { weekday: "Monday".into() }
        );
    }

    #[test]
    fn test_inline_match_returns_min_max_window() {
        let source = AvailabilitySource::Inline(monday_schedule(&["10:00", "09:00", "09:30"]));
        let slot = resolve(&source, 30, at(2026, 2, 2, 9, 30), now()).unwrap();

        assert_eq!(slot.requested, at(2026, 2, 2, 9, 30));
        assert_eq!(slot.window.start, at(2026, 2, 2, 9, 0));
        assert_eq!(slot.window.end, at(2026, 2, 2, 10, 0));
        assert!(slot.window.contains(slot.requested));
    }

    #[test]
    fn test_inline_requires_verbatim_slot() {
        let source = AvailabilitySource::Inline(monday_schedule(&["09:00", "10:00"]));
        let err = resolve(&source, 30, at(2026, 2, 2, 9, 30), now()).unwrap_err();
        assert_eq!(err, SlotRejection::OutsideWindow { time: "09:30".into() });
    }

    #[test]
    fn test_past_and_previous_year() {
        let source = AvailabilitySource::Inline(monday_schedule(&["09:00"]));
        let now = at(2026, 3, 4, 12, 0);

        assert_eq!(
            resolve(&source, 30, at(2025, 12, 29, 9, 0), now).unwrap_err(),
            SlotRejection::PreviousYear
        );
        assert_eq!(
            resolve(&source, 30, at(2026, 2, 2, 9, 0), now).unwrap_err(),
            SlotRejection::InPast
        );
        // Same minute as now is still bookable.
        let exact_now = at(2026, 2, 2, 9, 0);
        assert!(resolve(&source, 30, exact_now, exact_now).is_ok());
    }

    #[test]
    fn test_relational_steps_by_duration() {
        let source = AvailabilitySource::Relational(vec![monday_row(t(9, 0), t(12, 0))]);

        let slot = resolve(&source, 45, at(2026, 2, 2, 10, 30), now()).unwrap();
        assert_eq!(slot.window.start, at(2026, 2, 2, 10, 30));
        assert_eq!(slot.window.end, at(2026, 2, 2, 11, 15));

        let err = resolve(&source, 45, at(2026, 2, 2, 10, 0), now()).unwrap_err();
        assert_eq!(err, SlotRejection::NotSlotStart { time: "10:00".into() });
    }

    #[test]
    fn test_relational_slot_must_fit_window() {
        // 09:00, 10:00, 11:00 are starts; 11:00 + 60 > 11:30
        let source = AvailabilitySource::Relational(vec![monday_row(t(9, 0), t(11, 30))]);
        assert!(resolve(&source, 60, at(2026, 2, 2, 10, 0), now()).is_ok());
        assert!(matches!(
            resolve(&source, 60, at(2026, 2, 2, 11, 0), now()),
            Err(SlotRejection::NotSlotStart { .. })
        ));
    }

    #[test]
    fn test_relational_outside_window_and_missing_day() {
        let source = AvailabilitySource::Relational(vec![
            monday_row(t(9, 0), t(12, 0)),
            monday_row(t(14, 0), t(16, 0)),
        ]);
        assert_eq!(
            resolve(&source, 30, at(2026, 2, 2, 12, 0), now()).unwrap_err(),
            SlotRejection::OutsideWindow { time: "12:00".into() }
        );
        assert!(resolve(&source, 30, at(2026, 2, 2, 14, 30), now()).is_ok());

        // 2026-02-03 is a Tuesday
        assert_eq!(
            resolve(&source, 30, at(2026, 2, 3, 9, 0), now()).unwrap_err(),
            SlotRejection::NoAvailability { weekday: "Tuesday".into() }
        );
    }

    #[test]
    fn test_relational_tries_every_overlapping_row() {
        // 09:45 is not a start of the first row (09:00, 09:30, 10:00 ...)
        // but is one of the second (09:15, 09:45 ...).
        let source = AvailabilitySource::Relational(vec![
            monday_row(t(9, 0), t(12, 0)),
            monday_row(t(9, 15), t(12, 0)),
        ]);
        let slot = resolve(&source, 30, at(2026, 2, 2, 9, 45), now()).unwrap();
        assert_eq!(slot.window.start, at(2026, 2, 2, 9, 45));
        assert_eq!(slot.window.end, at(2026, 2, 2, 10, 15));

        assert_eq!(
            resolve(&source, 30, at(2026, 2, 2, 9, 20), now()).unwrap_err(),
            SlotRejection::NotSlotStart { time: "09:20".into() }
        );
    }

    #[test]
    fn test_relational_ignores_unavailable_rows() {
        let mut row = monday_row(t(9, 0), t(12, 0));
        row.is_available = false;
        let source = AvailabilitySource::Relational(vec![row]);
        assert!(matches!(
            resolve(&source, 30, at(2026, 2, 2, 9, 0), now()),
            Err(SlotRejection::NoAvailability { .. })
        ));
    }

    #[test]
    fn test_zero_duration_uses_default() {
        let source = AvailabilitySource::Relational(vec![monday_row(t(9, 0), t(12, 0))]);
        let slot = resolve(&source, 0, at(2026, 2, 2, 10, 0), now()).unwrap();
        assert_eq!(slot.window.end, at(2026, 2, 2, 11, 0));
    }
}
