//! Resolving the reference timezone and computing local dates and day bounds in it.

use time::{Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};
use time_tz::{Offset, TimeZone, Tz};

use crate::Error;

/// The timezone in which dates are displayed and "today" is decided.
pub const DEFAULT_TIMEZONE: &str = "America/Lima";

/// A source of the current instant.
pub trait Clock: Send + Sync {
    /// The current instant in UTC.
    fn now_utc(&self) -> OffsetDateTime;
}

/// The clock that reads the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A canonical timezone, e.g. "America/Lima", resolved from the tz database.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceZone {
    tz: &'static Tz,
}

impl ReferenceZone {
    /// Look up a canonical timezone name.
    ///
    /// # Errors
    /// Returns [Error::InvalidTimezone] if `name` is not in the tz database.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        time_tz::timezones::get_by_name(name)
            .map(|tz| Self { tz })
            .ok_or_else(|| {
                tracing::error!("Invalid timezone {}", name);
                Error::InvalidTimezone(name.to_owned())
            })
    }

    /// The canonical name of the timezone.
    pub fn name(&self) -> &'static str {
        self.tz.name()
    }

    /// The UTC offset of the zone at `instant`.
    pub fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
        self.tz.get_offset_utc(&instant).to_utc()
    }

    /// Express `instant` in the zone's local time.
    pub fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime {
        instant.to_offset(self.offset_at(instant))
    }

    /// Interpret a wall-clock time without an offset as local time in the zone.
    pub fn assume_local(&self, local: PrimitiveDateTime) -> OffsetDateTime {
        let guess = local.assume_offset(self.offset_at(local.assume_utc()));
        let offset = self.offset_at(guess);

        if offset == guess.offset() {
            guess
        } else {
            local.assume_offset(offset)
        }
    }

    /// The current date in the zone.
    pub fn today(&self, clock: &dyn Clock) -> Date {
        self.to_local(clock.now_utc()).date()
    }

    /// The first instant of `date` in the zone.
    pub fn start_of_day(&self, date: Date) -> OffsetDateTime {
        self.assume_local(date.midnight())
    }

    /// The last millisecond of `date` in the zone.
    pub fn end_of_day(&self, date: Date) -> OffsetDateTime {
        let last_millisecond = Time::from_hms_milli(23, 59, 59, 999).unwrap_or(Time::MIDNIGHT);

        self.assume_local(date.with_time(last_millisecond))
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        Self {
            tz: time_tz::timezones::db::america::LIMA,
        }
    }
}
