//! Date-range helpers for the monitor's search filters.

use time::{Date, OffsetDateTime};

use crate::timezone::ReferenceZone;

/// An inclusive range of local dates in the reference timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// The first day of the range.
    pub start: Date,
    /// The last day of the range.
    pub end: Date,
}

impl DateRange {
    /// A range covering the single day `date`.
    pub fn single_day(date: Date) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Whether `date` falls within the range.
    pub fn contains(&self, date: Date) -> bool {
        self.start <= date && date <= self.end
    }

    /// The first and last instants of the range in `zone`.
    pub fn bounds(&self, zone: &ReferenceZone) -> (OffsetDateTime, OffsetDateTime) {
        (zone.start_of_day(self.start), zone.end_of_day(self.end))
    }
}

/// The reasons a searched date range is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// The start or end date was not given.
    #[error("Seleccione ambas fechas")]
    MissingDates,
    /// The start date is after the end date.
    #[error("La fecha de inicio no puede ser mayor a la fecha fin")]
    StartAfterEnd,
    /// The start date is after today.
    #[error("La fecha de inicio no puede ser mayor a hoy")]
    StartInFuture,
    /// The end date is after today.
    #[error("La fecha fin no puede ser mayor a hoy")]
    EndInFuture,
}

/// Check a searched range against `today`.
///
/// # Errors
/// Returns the first rule the range breaks, checked in the order of the
/// [RangeError] variants.
pub fn validate_search(
    start: Option<Date>,
    end: Option<Date>,
    today: Date,
) -> Result<DateRange, RangeError> {
    let (Some(start), Some(end)) = (start, end) else {
        return Err(RangeError::MissingDates);
    };

    if start > end {
        return Err(RangeError::StartAfterEnd);
    }

    if start > today {
        return Err(RangeError::StartInFuture);
    }

    if end > today {
        return Err(RangeError::EndInFuture);
    }

    Ok(DateRange { start, end })
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use crate::{
        timezone::ReferenceZone,
        transaction::range::{DateRange, RangeError, validate_search},
    };

    const TODAY: time::Date = date!(2024 - 01 - 10);

    #[test]
    fn accepts_range_ending_today() {
        let got = validate_search(Some(date!(2024 - 01 - 01)), Some(TODAY), TODAY);

        assert_eq!(
            Ok(DateRange {
                start: date!(2024 - 01 - 01),
                end: TODAY
            }),
            got
        );
    }

    #[test]
    fn rejects_missing_dates() {
        assert_eq!(
            Err(RangeError::MissingDates),
            validate_search(None, Some(TODAY), TODAY)
        );
        assert_eq!(
            Err(RangeError::MissingDates),
            validate_search(Some(TODAY), None, TODAY)
        );
    }

    #[test]
    fn rejects_start_after_end_before_checking_future() {
        let got = validate_search(Some(date!(2024 - 02 - 01)), Some(TODAY), TODAY);

        assert_eq!(Err(RangeError::StartAfterEnd), got);
    }

    #[test]
    fn rejects_future_dates() {
        assert_eq!(
            Err(RangeError::StartInFuture),
            validate_search(
                Some(date!(2024 - 01 - 11)),
                Some(date!(2024 - 01 - 12)),
                TODAY
            )
        );
        assert_eq!(
            Err(RangeError::EndInFuture),
            validate_search(Some(TODAY), Some(date!(2024 - 01 - 11)), TODAY)
        );
    }

    #[test]
    fn contains_is_inclusive() {
        let range = DateRange {
            start: date!(2024 - 01 - 01),
            end: date!(2024 - 01 - 03),
        };

        assert!(range.contains(date!(2024 - 01 - 01)));
        assert!(range.contains(date!(2024 - 01 - 03)));
        assert!(!range.contains(date!(2024 - 01 - 04)));
    }

    #[test]
    fn bounds_cover_whole_local_days() {
        let range = DateRange::single_day(date!(2024 - 01 - 01));

        let (start, end) = range.bounds(&ReferenceZone::default());

        assert_eq!(datetime!(2024-01-01 00:00 -5), start);
        assert_eq!(datetime!(2024-01-01 23:59:59.999 -5), end);
    }
}
