//! # Clock
//!
//! Source of "now" for the engine. Slot tables hold local wall-clock
//! strings, so the resolver compares against local time; persisted
//! timestamps use UTC.

use chrono::{DateTime, Local, NaiveDateTime, Utc};

/// Supplies the current time.
pub trait Clock: Send + Sync {
    /// Local wall-clock time, used for availability checks.
    fn now_local(&self) -> NaiveDateTime;

    /// Absolute time, used for references and `paid_at`.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// The machine clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_local(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    local: NaiveDateTime,
    utc: DateTime<Utc>,
}

impl FixedClock {
    /// Freezes at `local`, treating the machine as running on UTC.
    pub fn at(local: NaiveDateTime) -> Self {
        FixedClock {
            local,
            utc: local.and_utc(),
        }
    }
}

impl Clock for FixedClock {
    fn now_local(&self) -> NaiveDateTime {
        self.local
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.utc
    }
}
