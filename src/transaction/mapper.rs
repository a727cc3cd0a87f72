//! Maps transaction records to display items.
//!
//! Historical records keep the offset they were recorded with; live records
//! are always shown in the reference timezone. Mapping never fails: fields
//! that cannot be formatted degrade to placeholders.

use time::{
    Date, OffsetDateTime, PrimitiveDateTime,
    format_description::well_known::{Iso8601, Rfc3339},
};
use uuid::Uuid;

use crate::{
    timezone::ReferenceZone,
    transaction::{DisplayItem, TransactionRecord},
};

/// Shown when a record has no sender name.
pub const UNKNOWN_SENDER: &str = "Desconocido";

/// Shown when a record's notification time cannot be parsed.
pub const INVALID_DATE: &str = "Fecha inválida";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "ene", "feb", "mar", "abr", "may", "jun", "jul", "ago", "sept", "oct", "nov", "dic",
];

/// A notification time as parsed from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsedTimestamp {
    /// The string carried its own UTC offset.
    WithOffset(OffsetDateTime),
    /// The string had no offset and is a wall-clock time.
    Local(PrimitiveDateTime),
}

impl ParsedTimestamp {
    /// The instant, keeping an embedded offset and placing wall-clock times in `zone`.
    pub fn keep_offset(self, zone: &ReferenceZone) -> OffsetDateTime {
        match self {
            ParsedTimestamp::WithOffset(instant) => instant,
            ParsedTimestamp::Local(local) => zone.assume_local(local),
        }
    }

    /// The instant expressed in `zone`, whatever offset it was written with.
    pub fn in_zone(self, zone: &ReferenceZone) -> OffsetDateTime {
        match self {
            ParsedTimestamp::WithOffset(instant) => zone.to_local(instant),
            ParsedTimestamp::Local(local) => zone.assume_local(local),
        }
    }
}

/// Parse an ISO-8601 date-time, with or without an offset, or a bare date.
pub fn parse_timestamp(text: &str) -> Option<ParsedTimestamp> {
    let text = text.trim();

    if let Ok(instant) = OffsetDateTime::parse(text, &Rfc3339) {
        return Some(ParsedTimestamp::WithOffset(instant));
    }

    if let Ok(instant) = OffsetDateTime::parse(text, &Iso8601::DEFAULT) {
        return Some(ParsedTimestamp::WithOffset(instant));
    }

    if let Ok(local) = PrimitiveDateTime::parse(text, &Iso8601::DEFAULT) {
        return Some(ParsedTimestamp::Local(local));
    }

    Date::parse(text, &Iso8601::DEFAULT)
        .ok()
        .map(|date| ParsedTimestamp::Local(date.midnight()))
}

/// Format an amount with exactly two decimal places, e.g. "10.50".
pub fn format_amount(amount: f64) -> String {
    format!("{amount:.2}")
}

/// Format a date-time as "dd MMM yyyy - hh:mm a" in Spanish, lower-cased,
/// e.g. "02 ene 2024 - 04:00 a. m.".
pub fn format_notification_time(instant: OffsetDateTime) -> String {
    let month = MONTH_ABBREVIATIONS[usize::from(u8::from(instant.month())) - 1];
    let (hour, meridiem) = match instant.hour() {
        0 => (12, "a. m."),
        hour @ 1..=11 => (hour, "a. m."),
        12 => (12, "p. m."),
        hour => (hour - 12, "p. m."),
    };

    format!(
        "{:02} {} {} - {:02}:{:02} {}",
        instant.day(),
        month,
        instant.year(),
        hour,
        instant.minute(),
        meridiem
    )
}

/// Map a record from the historical range query, keeping its recorded offset.
pub fn historical_display_item(record: &TransactionRecord, zone: &ReferenceZone) -> DisplayItem {
    let date = parse_timestamp(&record.notified_at)
        .map(|timestamp| format_notification_time(timestamp.keep_offset(zone)));

    display_item(record, date)
}

/// Map a record from the live feed, shown in the reference timezone.
pub fn live_display_item(record: &TransactionRecord, zone: &ReferenceZone) -> DisplayItem {
    let date = parse_timestamp(&record.notified_at)
        .map(|timestamp| format_notification_time(timestamp.in_zone(zone)));

    display_item(record, date)
}

fn display_item(record: &TransactionRecord, date: Option<String>) -> DisplayItem {
    if date.is_none() {
        tracing::warn!(
            "could not parse notification time {:?} of transaction {:?}",
            record.notified_at,
            record.id
        );
    }

    DisplayItem {
        id: record
            .id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        sender: record
            .sender_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_SENDER.to_owned()),
        amount: format_amount(record.amount),
        date: date.unwrap_or_else(|| INVALID_DATE.to_owned()),
        currency: record.currency.clone(),
        payment_code: record.security_code.clone().unwrap_or_default(),
        origin: Some(record.origin.clone()).filter(|origin| !origin.is_empty()),
    }
}
