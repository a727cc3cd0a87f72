//! One viewer's monitor: the historical query, the merge buffer and the live handler.

use std::sync::{
    Arc, Mutex, MutexGuard, Weak,
    atomic::{AtomicBool, Ordering},
};

use time::{Date, Duration, OffsetDateTime};

use crate::{
    Error,
    alert::Notifier,
    auth::Role,
    monitor::buffer::{FetchTicket, LiveOutcome, MergeBuffer},
    realtime::TransactionHandler,
    timezone::{Clock, ReferenceZone},
    transaction::{
        DateRange, DisplayItem, TransactionRecord, TransactionRepository, live_display_item,
        validate_search,
    },
};

/// Shown when the historical query fails.
pub const LOAD_ERROR_MESSAGE: &str = "Error al cargar transacciones";

/// How long a newly received transaction stays highlighted.
pub const HIGHLIGHT_DURATION: Duration = Duration::seconds(5);

/// The state of the monitor at one point in time, ready for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    /// The visible range.
    pub range: DateRange,
    /// The current local date.
    pub today: Date,
    /// The items on the selected page.
    pub items: Vec<DisplayItem>,
    /// The number of visible items across all pages.
    pub item_count: usize,
    /// The sum of the visible records' amounts.
    pub total_amount: f64,
    /// The number of live inserts received while today was not visible.
    pub off_range_count: usize,
    /// The sum of the live inserts received while today was not visible.
    pub off_range_total: f64,
    /// The selected page.
    pub page: u64,
    /// The number of pages.
    pub page_count: u64,
    /// The ID of the item to highlight, if one arrived recently.
    pub highlighted_id: Option<String>,
    /// Whether a historical query is in flight.
    pub is_loading: bool,
}

#[derive(Debug)]
struct MonitorState {
    buffer: MergeBuffer,
    highlight: Option<(String, OffsetDateTime)>,
    /// Whether the visible range is the default "today" rather than a searched range.
    follows_today: bool,
}

impl MonitorState {
    /// Move a range that follows today on to `today` once the day has changed.
    fn roll_over(&mut self, today: Date) -> Option<FetchTicket> {
        if !self.follows_today || self.buffer.range().end >= today {
            return None;
        }

        self.highlight = None;
        Some(self.buffer.start_day(DateRange::single_day(today)))
    }
}

/// Drives the monitor for one viewer.
///
/// Closing the session makes it ignore query results and live inserts that
/// arrive afterwards. While it shows today rather than a searched range, it
/// moves on to the next day at local midnight.
pub struct MonitorSession {
    me: Weak<Self>,
    viewer_id: String,
    role: Role,
    zone: ReferenceZone,
    clock: Arc<dyn Clock>,
    repository: Arc<dyn TransactionRepository>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<MonitorState>,
    closed: AtomicBool,
}

impl MonitorSession {
    /// Create a session for `viewer_id` showing today. Nothing is loaded yet.
    pub fn new(
        viewer_id: &str,
        role: Role,
        zone: ReferenceZone,
        clock: Arc<dyn Clock>,
        repository: Arc<dyn TransactionRepository>,
        notifier: Arc<dyn Notifier>,
        page_size: usize,
    ) -> Arc<Self> {
        let today = zone.today(clock.as_ref());

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            viewer_id: viewer_id.to_owned(),
            role,
            zone,
            clock,
            repository,
            notifier,
            state: Mutex::new(MonitorState {
                buffer: MergeBuffer::new(DateRange::single_day(today), page_size),
                highlight: None,
                follows_today: true,
            }),
            closed: AtomicBool::new(false),
        })
    }

    /// The viewer whose transactions are shown.
    pub fn viewer_id(&self) -> &str {
        &self.viewer_id
    }

    /// The role of the signed in user.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the user may search other date ranges. Helpers only see today.
    pub fn can_search(&self) -> bool {
        self.role != Role::Helper
    }

    /// The current local date.
    pub fn today(&self) -> Date {
        self.zone.today(self.clock.as_ref())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MonitorState>, Error> {
        self.state.lock().map_err(|error| {
            tracing::error!("could not acquire the monitor lock: {error}");
            Error::LockError
        })
    }

    /// Fetch `range` and replace the visible list with the result.
    ///
    /// On failure the previous list is kept and an error alert is shown.
    /// Returns whether the result was applied.
    pub async fn load(&self, range: DateRange) -> bool {
        if self.is_closed() {
            return false;
        }

        let ticket = match self.lock() {
            Ok(mut state) => state.buffer.begin_fetch(range),
            Err(_) => return false,
        };

        self.finish_load(ticket).await
    }

    async fn finish_load(&self, ticket: FetchTicket) -> bool {
        let range = ticket.range();
        let (start, end) = range.bounds(&self.zone);
        let result = self
            .repository
            .get_transactions_by_date(&self.viewer_id, start, end)
            .await;

        if self.is_closed() {
            tracing::debug!("monitor for {} closed, dropping query result", self.viewer_id);
            return false;
        }

        let Ok(mut state) = self.lock() else {
            return false;
        };

        match result {
            Ok(records) => {
                tracing::info!(
                    "loaded {} transactions for {} from {} to {}",
                    records.len(),
                    self.viewer_id,
                    range.start,
                    range.end
                );
                state.buffer.complete_fetch(ticket, records, &self.zone)
            }
            Err(error) => {
                tracing::error!("Error fetching transactions for {}: {error}", self.viewer_id);
                state.buffer.fail_fetch(ticket);
                drop(state);
                self.notifier.error(LOAD_ERROR_MESSAGE);
                false
            }
        }
    }

    /// Validate a searched range and load it.
    ///
    /// Helpers cannot search, so for them this reloads today.
    ///
    /// # Errors
    /// Returns [Error::InvalidRange] if the range is rejected, in which case
    /// nothing is loaded.
    pub async fn search(&self, start: Option<Date>, end: Option<Date>) -> Result<DateRange, Error> {
        if !self.can_search() {
            return Ok(self.refresh_today().await);
        }

        let range = validate_search(start, end, self.today())?;
        self.set_follows_today(false);
        self.load(range).await;

        Ok(range)
    }

    /// Show today again and reload it.
    pub async fn refresh_today(&self) -> DateRange {
        let range = DateRange::single_day(self.today());
        self.set_follows_today(true);
        self.load(range).await;

        range
    }

    fn set_follows_today(&self, follows_today: bool) {
        if let Ok(mut state) = self.lock() {
            state.follows_today = follows_today;
        }
    }

    /// Fetch the new day opened by [MonitorState::roll_over] without blocking the caller.
    fn load_in_background(&self, ticket: FetchTicket) {
        let Some(session) = self.me.upgrade() else {
            return;
        };

        tracing::info!("the day changed, loading {} for {}", ticket.range().start, self.viewer_id);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    session.finish_load(ticket).await;
                });
            }
            Err(error) => {
                tracing::warn!("could not load the new day for {}: {error}", self.viewer_id);
                if let Ok(mut state) = self.lock() {
                    state.buffer.fail_fetch(ticket);
                }
            }
        }
    }

    /// A handler that passes live inserts to this session for as long as it exists.
    pub fn live_handler(self: &Arc<Self>) -> TransactionHandler {
        let session: Weak<Self> = Arc::downgrade(self);

        Arc::new(move |record| match session.upgrade() {
            Some(session) => session.accept_live(record).map(|_| ()),
            None => Ok(()),
        })
    }

    /// Add a live insert to the monitor and announce it.
    ///
    /// # Errors
    /// Returns [Error::LockError] if the monitor state could not be locked.
    pub fn accept_live(&self, record: TransactionRecord) -> Result<LiveOutcome, Error> {
        if self.is_closed() {
            return Ok(LiveOutcome::OutsideRange);
        }

        let today = self.today();
        let announced = live_display_item(&record, &self.zone);
        let (outcome, new_day) = {
            let mut state = self.lock()?;
            let new_day = state.roll_over(today);
            let outcome = state.buffer.push_live(record, today, &self.zone);

            if let LiveOutcome::Spliced(item) = &outcome {
                state.highlight = Some((item.id.clone(), self.clock.now_utc() + HIGHLIGHT_DURATION));
            }

            (outcome, new_day)
        };

        if let Some(ticket) = new_day {
            self.load_in_background(ticket);
        }

        if outcome != LiveOutcome::Duplicate {
            self.notifier.success(&format!(
                "Nueva transacción: {} {}",
                announced.currency, announced.amount
            ));
        }

        Ok(outcome)
    }

    /// The monitor's state, selecting `page` first if given.
    ///
    /// # Errors
    /// Returns [Error::LockError] if the monitor state could not be locked.
    pub fn snapshot(&self, page: Option<u64>) -> Result<MonitorSnapshot, Error> {
        let now = self.clock.now_utc();
        let today = self.today();
        let mut state = self.lock()?;

        if !self.is_closed() {
            if let Some(ticket) = state.roll_over(today) {
                drop(state);
                self.load_in_background(ticket);
                state = self.lock()?;
            }
        }

        if let Some(page) = page {
            state.buffer.set_page(page);
        }

        let highlighted_id = match &state.highlight {
            Some((id, until)) if now < *until => Some(id.clone()),
            _ => None,
        };
        let buffer = &state.buffer;

        Ok(MonitorSnapshot {
            range: buffer.range(),
            today,
            items: buffer.page_items(),
            item_count: buffer.len(),
            total_amount: buffer.total_amount(),
            off_range_count: buffer.off_range_count(),
            off_range_total: buffer.off_range_total(),
            page: buffer.current_page(),
            page_count: buffer.page_count(),
            highlighted_id,
            is_loading: buffer.is_loading(),
        })
    }

    /// The visible range and the raw records behind the visible list, newest first.
    ///
    /// # Errors
    /// Returns [Error::LockError] if the monitor state could not be locked.
    pub fn visible_records(&self) -> Result<(DateRange, Vec<TransactionRecord>), Error> {
        let state = self.lock()?;

        Ok((state.buffer.range(), state.buffer.records().cloned().collect()))
    }

    /// The reference timezone.
    pub fn zone(&self) -> &ReferenceZone {
        &self.zone
    }

    /// Stop applying query results and live inserts.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!("closed the monitor for {}", self.viewer_id);
    }

    /// Whether [MonitorSession::close] was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use time::{Duration, macros::{date, datetime}};

    use crate::{
        Error,
        alert::{Alert, AlertLog},
        auth::Role,
        monitor::{
            LiveOutcome, MonitorSession,
            session::{HIGHLIGHT_DURATION, LOAD_ERROR_MESSAGE},
        },
        test_utils::{FakeTransactionRepository, SharedClock},
        timezone::ReferenceZone,
        transaction::{DateRange, RangeError, format_amount, test_records::record},
    };

    fn session_with(
        role: Role,
        repository: Arc<FakeTransactionRepository>,
    ) -> (Arc<MonitorSession>, Arc<AlertLog>, Arc<SharedClock>) {
        let alerts = Arc::new(AlertLog::new());
        // 2024-01-02 09:00 in Lima.
        let clock = Arc::new(SharedClock::new(datetime!(2024-01-02 14:00 UTC)));
        let session = MonitorSession::new(
            "admin-1",
            role,
            ReferenceZone::default(),
            clock.clone(),
            repository,
            alerts.clone(),
            10,
        );

        (session, alerts, clock)
    }

    fn item_ids(session: &MonitorSession) -> Vec<String> {
        session
            .snapshot(None)
            .unwrap()
            .items
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    #[tokio::test]
    async fn loads_today_with_local_day_bounds() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![record(
            Some("a"),
            10.5,
            "2024-01-01T10:00:00-05:00",
        )]));
        let (session, alerts, _) = session_with(Role::Admin, repository.clone());

        let range = session.refresh_today().await;

        assert_eq!(DateRange::single_day(date!(2024 - 01 - 02)), range);
        assert_eq!(vec!["a"], item_ids(&session));
        assert_eq!(
            vec![(
                "admin-1".to_owned(),
                datetime!(2024-01-02 00:00 -5),
                datetime!(2024-01-02 23:59:59.999 -5)
            )],
            repository.calls()
        );
        assert!(alerts.drain().is_empty());
    }

    #[tokio::test]
    async fn live_insert_while_viewing_today_is_listed_highlighted_and_announced() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![record(
            Some("a"),
            10.5,
            "2024-01-01T10:00:00-05:00",
        )]));
        let (session, alerts, clock) = session_with(Role::Admin, repository);
        session.refresh_today().await;

        let handler = session.live_handler();
        handler(record(Some("b"), 20.0, "2024-01-02T09:00:00Z")).unwrap();

        let snapshot = session.snapshot(None).unwrap();
        assert_eq!(vec!["b", "a"], item_ids(&session));
        assert_eq!("30.50", format_amount(snapshot.total_amount));
        assert_eq!(Some("b".to_owned()), snapshot.highlighted_id);
        assert_eq!(
            vec![Alert::success("Nueva transacción: PEN 20.00")],
            alerts.drain()
        );

        clock.advance(HIGHLIGHT_DURATION + Duration::seconds(1));
        assert_eq!(None, session.snapshot(None).unwrap().highlighted_id);
    }

    #[tokio::test]
    async fn live_insert_during_historical_range_is_counted_aside() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![record(
            Some("a"),
            10.5,
            "2024-01-01T10:00:00-05:00",
        )]));
        let (session, alerts, _) = session_with(Role::Admin, repository);
        session
            .search(Some(date!(2024 - 01 - 01)), Some(date!(2024 - 01 - 01)))
            .await
            .unwrap();

        let outcome = session
            .accept_live(record(Some("b"), 20.0, "2024-01-02T09:00:00Z"))
            .unwrap();

        let snapshot = session.snapshot(None).unwrap();
        assert_eq!(LiveOutcome::OutsideRange, outcome);
        assert_eq!(vec!["a"], item_ids(&session));
        assert_eq!(1, snapshot.off_range_count);
        assert_eq!(None, snapshot.highlighted_id);
        assert_eq!(1, alerts.drain().len());
    }

    #[tokio::test]
    async fn live_insert_after_midnight_moves_today_to_the_new_day() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![record(
            Some("a"),
            10.5,
            "2024-01-02T08:00:00-05:00",
        )]));
        let (session, alerts, clock) = session_with(Role::Admin, repository.clone());
        session.refresh_today().await;
        repository.set_records(Vec::new());
        clock.advance(Duration::days(1));

        let outcome = session
            .accept_live(record(Some("n"), 5.0, "2024-01-03T14:00:00Z"))
            .unwrap();

        assert!(matches!(outcome, LiveOutcome::Spliced(ref item) if item.id == "n"));
        let snapshot = session.snapshot(None).unwrap();
        assert_eq!(DateRange::single_day(date!(2024 - 01 - 03)), snapshot.range);
        assert_eq!(0, snapshot.off_range_count);
        assert_eq!(vec!["n"], item_ids(&session));
        assert_eq!(
            vec![Alert::success("Nueva transacción: PEN 5.00")],
            alerts.drain()
        );

        for _ in 0..100 {
            if !session.snapshot(None).unwrap().is_loading {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(
            Some(&(
                "admin-1".to_owned(),
                datetime!(2024-01-03 00:00 -5),
                datetime!(2024-01-03 23:59:59.999 -5)
            )),
            repository.calls().last()
        );
        assert_eq!(vec!["n"], item_ids(&session));
    }

    #[tokio::test]
    async fn polling_after_midnight_reloads_today() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![record(
            Some("a"),
            10.5,
            "2024-01-02T08:00:00-05:00",
        )]));
        let (session, _, clock) = session_with(Role::Admin, repository.clone());
        session.refresh_today().await;
        repository.set_records(vec![record(Some("m"), 3.0, "2024-01-03T01:00:00-05:00")]);
        clock.advance(Duration::days(1));

        let snapshot = session.snapshot(None).unwrap();
        assert_eq!(DateRange::single_day(date!(2024 - 01 - 03)), snapshot.range);
        assert!(snapshot.items.is_empty());

        for _ in 0..100 {
            if !session.snapshot(None).unwrap().is_loading {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert_eq!(vec!["m"], item_ids(&session));
    }

    #[tokio::test]
    async fn searched_range_stays_put_after_midnight() {
        let repository = Arc::new(FakeTransactionRepository::with_records(Vec::new()));
        let (session, _, clock) = session_with(Role::Admin, repository.clone());
        let searched = session
            .search(Some(date!(2024 - 01 - 01)), Some(date!(2024 - 01 - 02)))
            .await
            .unwrap();
        clock.advance(Duration::days(1));

        let outcome = session
            .accept_live(record(Some("n"), 5.0, "2024-01-03T14:00:00Z"))
            .unwrap();

        assert_eq!(LiveOutcome::OutsideRange, outcome);
        assert_eq!(searched, session.snapshot(None).unwrap().range);
        assert_eq!(1, repository.calls().len());
    }

    #[tokio::test]
    async fn failed_load_keeps_list_and_reports_error() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![record(
            Some("a"),
            10.5,
            "2024-01-02T08:00:00-05:00",
        )]));
        let (session, alerts, _) = session_with(Role::Admin, repository.clone());
        session.refresh_today().await;

        repository.fail_next(Error::Platform(500, "boom".to_owned()));
        let applied = session.refresh_today().await;

        assert_eq!(DateRange::single_day(date!(2024 - 01 - 02)), applied);
        assert_eq!(vec!["a"], item_ids(&session));
        assert_eq!(vec![Alert::error(LOAD_ERROR_MESSAGE)], alerts.drain());
        assert!(!session.snapshot(None).unwrap().is_loading);
    }

    #[tokio::test]
    async fn invalid_search_loads_nothing() {
        let repository = Arc::new(FakeTransactionRepository::with_records(Vec::new()));
        let (session, _, _) = session_with(Role::Admin, repository.clone());

        let result = session
            .search(Some(date!(2024 - 01 - 03)), Some(date!(2024 - 01 - 01)))
            .await;

        assert_eq!(Err(Error::InvalidRange(RangeError::StartAfterEnd)), result);
        assert!(repository.calls().is_empty());
    }

    #[tokio::test]
    async fn helpers_always_see_today() {
        let repository = Arc::new(FakeTransactionRepository::with_records(Vec::new()));
        let (session, _, _) = session_with(Role::Helper, repository);

        let range = session
            .search(Some(date!(2023 - 12 - 01)), Some(date!(2023 - 12 - 31)))
            .await
            .unwrap();

        assert!(!session.can_search());
        assert_eq!(DateRange::single_day(date!(2024 - 01 - 02)), range);
    }

    #[tokio::test]
    async fn live_insert_during_load_is_not_lost() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![
            record(Some("b"), 20.0, "2024-01-02T04:00:00-05:00"),
            record(Some("a"), 10.5, "2024-01-02T03:00:00-05:00"),
        ]));
        let gate = repository.hold_responses();
        let (session, _, _) = session_with(Role::Admin, repository);

        let loading = tokio::spawn({
            let session = session.clone();
            async move { session.refresh_today().await }
        });
        tokio::task::yield_now().await;
        session
            .accept_live(record(Some("c"), 1.0, "2024-01-02T14:00:00Z"))
            .unwrap();
        session
            .accept_live(record(Some("b"), 20.0, "2024-01-02T09:00:00Z"))
            .unwrap();
        gate.notify_one();
        loading.await.unwrap();

        assert_eq!(vec!["b", "c", "a"], item_ids(&session));
    }

    #[tokio::test]
    async fn closed_session_ignores_results_and_inserts() {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![record(
            Some("a"),
            10.5,
            "2024-01-02T08:00:00-05:00",
        )]));
        let gate = repository.hold_responses();
        let (session, alerts, _) = session_with(Role::Admin, repository);

        let loading = tokio::spawn({
            let session = session.clone();
            async move { session.refresh_today().await }
        });
        tokio::task::yield_now().await;
        session.close();
        gate.notify_one();
        loading.await.unwrap();
        session
            .accept_live(record(Some("b"), 20.0, "2024-01-02T09:00:00Z"))
            .unwrap();

        assert!(item_ids(&session).is_empty());
        assert!(alerts.drain().is_empty());
    }

    #[tokio::test]
    async fn handler_outlives_dropped_session() {
        let repository = Arc::new(FakeTransactionRepository::with_records(Vec::new()));
        let (session, alerts, _) = session_with(Role::Admin, repository);
        let handler = session.live_handler();

        drop(session);

        assert_eq!(
            Ok(()),
            handler(record(Some("b"), 20.0, "2024-01-02T09:00:00Z"))
        );
        assert!(alerts.drain().is_empty());
    }
}
