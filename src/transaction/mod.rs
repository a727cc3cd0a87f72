//! Payment notification records, their display mapping and the historical query.

mod mapper;
mod models;
mod range;
mod repository;

pub use mapper::{
    INVALID_DATE, UNKNOWN_SENDER, format_amount, historical_display_item, live_display_item,
    parse_timestamp,
};
pub use models::{DisplayItem, TransactionRecord};
pub use range::{DateRange, RangeError, validate_search};
pub use repository::TransactionRepository;

#[cfg(test)]
pub(crate) use mapper::test_records;
