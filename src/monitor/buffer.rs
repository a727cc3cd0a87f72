//! The ordered list of transactions shown on the monitor.
//!
//! The buffer is seeded by a historical fetch for the visible range and kept
//! current by live inserts, newest first. A fetch is identified by a
//! [FetchTicket]; only the result for the latest ticket is applied, and live
//! items that arrived while it was in flight are kept ahead of it.

use std::collections::{HashSet, VecDeque};

use time::Date;

use crate::{
    timezone::ReferenceZone,
    transaction::{DateRange, DisplayItem, TransactionRecord, historical_display_item, live_display_item},
};

/// The number of rows shown per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Identifies one historical fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    range: DateRange,
}

impl FetchTicket {
    /// The range being fetched.
    pub fn range(&self) -> DateRange {
        self.range
    }
}

/// What happened to a live insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveOutcome {
    /// The item was added at the head of the visible list.
    Spliced(DisplayItem),
    /// A record with the same ID is already held.
    Duplicate,
    /// The visible range does not include today, so the record was only counted.
    OutsideRange,
}

#[derive(Debug, Clone)]
struct Entry {
    item: DisplayItem,
    record: TransactionRecord,
    /// The fetch generation during which a live entry arrived, `None` for fetched entries.
    live_during: Option<u64>,
}

/// Historical results merged with live inserts, newest first.
#[derive(Debug, Clone)]
pub struct MergeBuffer {
    entries: VecDeque<Entry>,
    seen: HashSet<String>,
    off_range: Vec<TransactionRecord>,
    off_range_seen: HashSet<String>,
    range: DateRange,
    last_good_range: DateRange,
    generation: u64,
    in_flight: bool,
    current_page: u64,
    page_size: u64,
}

impl MergeBuffer {
    /// Create an empty buffer showing `range`.
    pub fn new(range: DateRange, page_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            seen: HashSet::new(),
            off_range: Vec::new(),
            off_range_seen: HashSet::new(),
            range,
            last_good_range: range,
            generation: 0,
            in_flight: false,
            current_page: 1,
            page_size: page_size.max(1) as u64,
        }
    }

    /// The visible range.
    pub fn range(&self) -> DateRange {
        self.range
    }

    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Start fetching `range`, superseding any fetch still in flight.
    ///
    /// Live inserts that arrive from now on are checked against `range`.
    pub fn begin_fetch(&mut self, range: DateRange) -> FetchTicket {
        self.generation += 1;
        self.in_flight = true;

        if range != self.range {
            self.off_range.clear();
            self.off_range_seen.clear();
        }

        self.range = range;

        FetchTicket {
            generation: self.generation,
            range,
        }
    }

    /// Move to the new day `range`, dropping the previous day's items, and start fetching it.
    ///
    /// The empty list for the new day counts as good, so a failed fetch keeps it.
    pub fn start_day(&mut self, range: DateRange) -> FetchTicket {
        self.entries.clear();
        self.seen.clear();
        self.last_good_range = range;
        self.current_page = 1;

        self.begin_fetch(range)
    }

    /// Replace the buffer with the fetched `records`, which are newest first.
    ///
    /// Live items that arrived after `ticket` was issued stay ahead of the
    /// fetched ones, and fetched records they already hold are skipped.
    /// Returns false, leaving the buffer untouched, if `ticket` was superseded.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        records: Vec<TransactionRecord>,
        zone: &ReferenceZone,
    ) -> bool {
        if ticket.generation != self.generation {
            tracing::debug!(
                "ignoring the result of superseded fetch {}",
                ticket.generation
            );
            return false;
        }

        let mut entries: VecDeque<Entry> = self
            .entries
            .drain(..)
            .filter(|entry| entry.live_during == Some(ticket.generation))
            .collect();
        let mut seen: HashSet<String> = entries
            .iter()
            .filter_map(|entry| entry.record.id.clone())
            .collect();

        for record in records {
            if record.id.as_ref().is_some_and(|id| !seen.insert(id.clone())) {
                continue;
            }

            entries.push_back(Entry {
                item: historical_display_item(&record, zone),
                record,
                live_during: None,
            });
        }

        self.entries = entries;
        self.seen = seen;
        self.in_flight = false;
        self.last_good_range = ticket.range;
        self.current_page = 1;

        true
    }

    /// Give up on the fetch for `ticket`, keeping the last good list and range.
    pub fn fail_fetch(&mut self, ticket: FetchTicket) {
        if ticket.generation != self.generation {
            return;
        }

        self.in_flight = false;
        self.range = self.last_good_range;
    }

    /// Add a live insert, given the current local date `today`.
    pub fn push_live(
        &mut self,
        record: TransactionRecord,
        today: Date,
        zone: &ReferenceZone,
    ) -> LiveOutcome {
        if !self.range.contains(today) {
            if record
                .id
                .as_ref()
                .is_some_and(|id| !self.off_range_seen.insert(id.clone()))
            {
                return LiveOutcome::Duplicate;
            }

            self.off_range.push(record);
            return LiveOutcome::OutsideRange;
        }

        if record
            .id
            .as_ref()
            .is_some_and(|id| !self.seen.insert(id.clone()))
        {
            tracing::debug!("ignoring redelivered transaction {:?}", record.id);
            return LiveOutcome::Duplicate;
        }

        let item = live_display_item(&record, zone);
        let live_during = self.in_flight.then_some(self.generation);
        self.entries.push_front(Entry {
            item: item.clone(),
            record,
            live_during,
        });
        self.current_page = 1;

        LiveOutcome::Spliced(item)
    }

    /// Every visible item, newest first.
    pub fn items(&self) -> impl Iterator<Item = &DisplayItem> {
        self.entries.iter().map(|entry| &entry.item)
    }

    /// The raw records behind the visible items, in the same order.
    pub fn records(&self) -> impl Iterator<Item = &TransactionRecord> {
        self.entries.iter().map(|entry| &entry.record)
    }

    /// The number of visible items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no visible items.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The sum of the visible records' amounts.
    pub fn total_amount(&self) -> f64 {
        self.entries.iter().map(|entry| entry.record.amount).sum()
    }

    /// The number of live inserts received while today was not visible.
    pub fn off_range_count(&self) -> usize {
        self.off_range.len()
    }

    /// The sum of the live inserts received while today was not visible.
    pub fn off_range_total(&self) -> f64 {
        self.off_range.iter().map(|record| record.amount).sum()
    }

    /// The number of rows per page.
    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// The number of pages, at least one.
    pub fn page_count(&self) -> u64 {
        (self.entries.len() as u64).div_ceil(self.page_size).max(1)
    }

    /// The page currently selected.
    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    /// Select `page`, clamped to the available pages. Returns the selected page.
    pub fn set_page(&mut self, page: u64) -> u64 {
        self.current_page = page.clamp(1, self.page_count());
        self.current_page
    }

    /// The items on the selected page.
    pub fn page_items(&self) -> Vec<DisplayItem> {
        let start = ((self.current_page - 1) * self.page_size) as usize;

        self.items()
            .skip(start)
            .take(self.page_size as usize)
            .cloned()
            .collect()
    }
}
