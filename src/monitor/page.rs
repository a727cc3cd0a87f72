//! The monitor page, its polled table and the search and refresh endpoints.

use std::sync::{Arc, RwLock};

use axum::{
    Form,
    extract::{FromRef, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::Deserialize;
use time::{Date, macros::format_description};
use tokio::sync::watch;

use crate::{
    AppState, Error,
    alert::{AlertLog, Notifier, alert_view, alerts_view},
    auth::{AuthStore, Role},
    endpoints,
    html::{
        BUTTON_EXPORT_STYLE, BUTTON_PRIMARY_STYLE, CARD_STYLE, FORM_LABEL_STYLE,
        FORM_TEXT_INPUT_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE,
        TABLE_ROW_HIGHLIGHT_STYLE, TABLE_ROW_STYLE, base, format_soles, loading_spinner,
    },
    monitor::{MonitorSession, MonitorSnapshot},
    navigation::Sidebar,
    pagination::{PaginationConfig, create_pagination_indicators, pagination_view},
    preferences::sound_toggle_view,
    profile::AdminProfile,
    transaction::DisplayItem,
};

/// How often the browser polls the table partial.
const POLL_TRIGGER: &str = "every 3s";

/// The state needed for the monitor page and its partials.
#[derive(Clone)]
pub struct MonitorPageState {
    /// The monitor, if the configured role has one.
    pub monitor: Option<Arc<MonitorSession>>,
    /// Who is signed in and their UI preferences.
    pub auth_store: Arc<RwLock<AuthStore>>,
    /// Pending toasts.
    pub alerts: Arc<AlertLog>,
    /// The administrator's profile for the header.
    pub profile: AdminProfile,
    /// Whether the realtime channel is subscribed.
    pub connection: watch::Receiver<bool>,
    /// Controls the page indicator.
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for MonitorPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            monitor: state.monitor.clone(),
            auth_store: state.auth_store.clone(),
            alerts: state.alerts.clone(),
            profile: state.profile.clone(),
            connection: state.connection.clone(),
            pagination_config: state.pagination_config,
        }
    }
}

struct Preferences {
    role: Role,
    sound_enabled: bool,
    sidebar_collapsed: bool,
}

impl MonitorPageState {
    /// The open monitor and the signed in user's preferences.
    fn open_monitor(&self) -> Result<(Arc<MonitorSession>, Preferences), Error> {
        let monitor = self.monitor.clone().ok_or(Error::NotFound)?;

        if monitor.is_closed() {
            return Err(Error::NoSession);
        }

        let store = self.auth_store.read().map_err(|error| {
            tracing::error!("could not acquire the auth store lock: {error}");
            Error::LockError
        })?;

        if store.user().is_none() {
            return Err(Error::NoSession);
        }

        let preferences = Preferences {
            role: store.role().unwrap_or(monitor.role()),
            sound_enabled: store.sound_enabled(),
            sidebar_collapsed: store.sidebar_collapsed(),
        };

        Ok((monitor, preferences))
    }

    fn is_connected(&self) -> bool {
        *self.connection.borrow()
    }
}

/// The query string of the monitor page.
#[derive(Debug, Default, Deserialize)]
pub struct MonitorQuery {
    /// The first day to search, as `yyyy-mm-dd`.
    pub start: Option<String>,
    /// The last day to search, as `yyyy-mm-dd`.
    pub end: Option<String>,
    /// The page of the table to show.
    pub page: Option<u64>,
}

/// The query string of the table partial.
#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    /// The page of the table to show. The current page is kept if omitted.
    pub page: Option<u64>,
}

/// The form data for searching a date range.
#[derive(Debug, Default, Deserialize)]
pub struct SearchForm {
    /// The first day, as `yyyy-mm-dd`.
    #[serde(default)]
    pub start: String,
    /// The last day, as `yyyy-mm-dd`.
    #[serde(default)]
    pub end: String,
}

/// Parse a date input's value. Empty or malformed values count as missing.
fn parse_date_input(value: &str) -> Option<Date> {
    let value = value.trim();

    if value.is_empty() {
        return None;
    }

    Date::parse(value, format_description!("[year]-[month]-[day]")).ok()
}

/// Render the monitor page.
///
/// If both `start` and `end` are given, that range is searched first.
pub async fn get_monitor_page(
    State(state): State<MonitorPageState>,
    Query(query): Query<MonitorQuery>,
) -> Response {
    let (monitor, preferences) = match state.open_monitor() {
        Ok(open) => open,
        Err(error) => return error.into_response(),
    };

    if query.start.is_some() || query.end.is_some() {
        let start = query.start.as_deref().and_then(parse_date_input);
        let end = query.end.as_deref().and_then(parse_date_input);

        if let Err(error) = monitor.search(start, end).await {
            state.alerts.error(&error.to_string());
        }
    }

    let snapshot = match monitor.snapshot(query.page) {
        Ok(snapshot) => snapshot,
        Err(error) => return error.into_response(),
    };

    let sidebar = Sidebar::new(endpoints::MONITOR_VIEW, preferences.role)
        .collapsed(preferences.sidebar_collapsed)
        .into_html();
    let show_filters = monitor.can_search() && state.profile.show_search_filter();
    let alerts = state.alerts.drain();

    let content = html! {
        div class="flex"
        {
            (sidebar)

            div class=(PAGE_CONTAINER_STYLE)
            {
                div class="flex flex-wrap items-center justify-between gap-4"
                {
                    h1 class="text-3xl font-bold tracking-tight"
                    {
                        "Monitor de Pagos"
                        @if let Some(name) = state.profile.display_name() {
                            " de " span class="text-[#0095e0]" { (name) }
                        }
                    }

                    (sound_toggle_view(preferences.sound_enabled))
                }

                @if show_filters {
                    (filters_view(&snapshot))
                } @else {
                    (refresh_view())
                }

                (summary_view(&snapshot, state.is_connected(), false))

                div class={(CARD_STYLE) " overflow-hidden"}
                {
                    (table_view(&snapshot, preferences.sound_enabled, state.pagination_config.max_pages))
                }
            }
        }

        (alerts_view(&alerts))
    };

    base("Monitor", &content).into_response()
}

/// Render the table partial that the page polls.
///
/// The summary and any pending alerts are swapped in out of band.
pub async fn get_monitor_table(
    State(state): State<MonitorPageState>,
    Query(query): Query<TableQuery>,
) -> Response {
    let (monitor, preferences) = match state.open_monitor() {
        Ok(open) => open,
        Err(error) => return error.into_alert_response(),
    };

    let snapshot = match monitor.snapshot(query.page) {
        Ok(snapshot) => snapshot,
        Err(error) => return error.into_alert_response(),
    };

    let alerts = state.alerts.drain();

    html! {
        (table_view(&snapshot, preferences.sound_enabled, state.pagination_config.max_pages))
        (summary_view(&snapshot, state.is_connected(), true))

        @if !alerts.is_empty() {
            div hx-swap-oob="beforeend:#alert-container"
            {
                @for alert in &alerts {
                    (alert_view(alert))
                }
            }
        }
    }
    .into_response()
}

/// Search a date range and reload the page on success.
pub async fn post_search(
    State(state): State<MonitorPageState>,
    Form(form): Form<SearchForm>,
) -> Response {
    let (monitor, _) = match state.open_monitor() {
        Ok(open) => open,
        Err(error) => return error.into_alert_response(),
    };

    let start = parse_date_input(&form.start);
    let end = parse_date_input(&form.end);

    match monitor.search(start, end).await {
        Ok(range) => {
            tracing::info!(
                "{} searched {} to {}",
                monitor.viewer_id(),
                range.start,
                range.end
            );

            (HxRedirect(endpoints::MONITOR_VIEW.to_owned()), StatusCode::SEE_OTHER).into_response()
        }
        Err(error) => error.into_alert_response(),
    }
}

/// Show today again and reload the page.
pub async fn post_refresh(State(state): State<MonitorPageState>) -> Response {
    let (monitor, _) = match state.open_monitor() {
        Ok(open) => open,
        Err(error) => return error.into_alert_response(),
    };

    let range = monitor.refresh_today().await;
    tracing::debug!("{} refreshed {}", monitor.viewer_id(), range.start);

    (HxRedirect(endpoints::MONITOR_VIEW.to_owned()), StatusCode::SEE_OTHER).into_response()
}

fn filters_view(snapshot: &MonitorSnapshot) -> Markup {
    let today = snapshot.today.to_string();
    let has_data = snapshot.item_count > 0;

    html! {
        div class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-4" { "Filtros de Búsqueda" }

            form
                hx-post=(endpoints::MONITOR_SEARCH)
                hx-target-error="#alert-container"
                class="grid grid-cols-1 md:grid-cols-3 gap-6 items-end"
            {
                div
                {
                    label for="start" class=(FORM_LABEL_STYLE) { "Fecha Inicio" }
                    input
                        id="start"
                        type="date"
                        name="start"
                        required
                        max=(today)
                        value=(snapshot.range.start)
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div
                {
                    label for="end" class=(FORM_LABEL_STYLE) { "Fecha Fin" }
                    input
                        id="end"
                        type="date"
                        name="end"
                        required
                        max=(today)
                        value=(snapshot.range.end)
                        class=(FORM_TEXT_INPUT_STYLE);
                }

                div class="flex gap-3"
                {
                    button type="submit" id="indicator" class={(BUTTON_PRIMARY_STYLE) " flex-1"}
                    {
                        span class="htmx-indicator" { (loading_spinner()) }
                        "Buscar"
                    }

                    // An empty export answers with an alert, which only htmx can show.
                    @if has_data {
                        a href=(endpoints::MONITOR_EXPORT) download class={(BUTTON_EXPORT_STYLE) " flex-1"}
                        {
                            "Excel"
                        }
                    } @else {
                        button
                            type="button"
                            hx-get=(endpoints::MONITOR_EXPORT)
                            hx-target-error="#alert-container"
                            class={(BUTTON_EXPORT_STYLE) " flex-1"}
                        {
                            "Excel"
                        }
                    }
                }
            }
        }
    }
}

fn refresh_view() -> Markup {
    html! {
        div class="flex justify-end"
        {
            button
                hx-post=(endpoints::MONITOR_REFRESH)
                hx-target-error="#alert-container"
                class=(BUTTON_PRIMARY_STYLE)
            {
                "Actualizar Hoy"
            }
        }
    }
}

fn summary_view(snapshot: &MonitorSnapshot, is_connected: bool, out_of_band: bool) -> Markup {
    let badge_style = if is_connected {
        "px-3 py-1 rounded-full text-xs font-semibold bg-green-100 text-green-800"
    } else {
        "px-3 py-1 rounded-full text-xs font-semibold bg-gray-200 text-gray-600"
    };

    html! {
        div
            id="monitor-summary"
            hx-swap-oob=[out_of_band.then_some("true")]
            class="flex flex-wrap items-center justify-between gap-4"
        {
            div class="flex items-center gap-3"
            {
                span class=(badge_style)
                {
                    @if is_connected { "CONECTADO" } @else { "NO CONECTADO" }
                }

                span class="text-sm text-gray-500"
                {
                    (snapshot.item_count) " Registros"
                }

                @if snapshot.range.start == snapshot.range.end {
                    span class="text-sm text-gray-500" { (snapshot.range.start) }
                } @else {
                    span class="text-sm text-gray-500" { (snapshot.range.start) " a " (snapshot.range.end) }
                }
            }

            div class="flex items-center gap-6"
            {
                @if snapshot.off_range_count > 0 {
                    span class="text-sm text-amber-700"
                    {
                        "En vivo hoy: " (snapshot.off_range_count) " · " (format_soles(snapshot.off_range_total))
                    }
                }

                span class="text-xl font-bold"
                {
                    "Total: "
                    span class="text-[#0095e0]" { (format_soles(snapshot.total_amount)) }
                }
            }
        }
    }
}

fn table_row_view(item: &DisplayItem, is_highlighted: bool) -> Markup {
    let row_style = if is_highlighted {
        TABLE_ROW_HIGHLIGHT_STYLE
    } else {
        TABLE_ROW_STYLE
    };

    html! {
        tr class=(row_style) data-id=(item.id)
        {
            td class={(TABLE_CELL_STYLE) " font-medium text-gray-900 dark:text-white"} { (item.sender) }
            td class=(TABLE_CELL_STYLE) { (item.date) }
            td class={(TABLE_CELL_STYLE) " font-semibold"} { (item.currency) " " (item.amount) }
            td class=(TABLE_CELL_STYLE) { (item.payment_code) }
            td class=(TABLE_CELL_STYLE)
            {
                @if item.is_yape() {
                    span class="px-2 py-1 rounded text-xs bg-purple-100 text-purple-800" { "Yape" }
                } @else {
                    (item.origin.as_deref().unwrap_or("-"))
                }
            }
        }
    }
}

fn table_view(snapshot: &MonitorSnapshot, sound_enabled: bool, max_pages: u64) -> Markup {
    let indicators = create_pagination_indicators(snapshot.page, snapshot.page_count, max_pages);

    html! {
        div
            id="monitor-table"
            hx-get=(endpoints::MONITOR_TABLE)
            hx-trigger=(POLL_TRIGGER)
            hx-swap="outerHTML"
            data-highlight=[snapshot.highlighted_id.as_deref()]
            data-sound=(if sound_enabled { "on" } else { "off" })
            class="space-y-4"
        {
            div class="relative overflow-x-auto"
            {
                table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Remitente" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Fecha" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Monto" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Código" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Origen" }
                        }
                    }

                    tbody
                    {
                        @for item in &snapshot.items {
                            (table_row_view(item, snapshot.highlighted_id.as_deref() == Some(item.id.as_str())))
                        }

                        @if snapshot.items.is_empty() {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td colspan="5" class="px-6 py-12 text-center"
                                {
                                    @if snapshot.is_loading {
                                        (loading_spinner()) "Cargando transacciones..."
                                    } @else {
                                        "No hay transacciones en este rango."
                                    }
                                }
                            }
                        }
                    }
                }
            }

            @if snapshot.page_count > 1 {
                (pagination_view(&indicators, endpoints::monitor_table_page))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, RwLock};

    use axum::{
        Form,
        extract::{Query, State},
        http::StatusCode,
    };
    use scraper::Selector;
    use time::macros::{date, datetime};
    use tokio::sync::watch;

    use crate::{
        Error,
        alert::{AlertLog, Notifier},
        auth::{AuthStore, Role, SignedInUser},
        endpoints,
        monitor::{
            MonitorSession,
            page::{
                MonitorPageState, MonitorQuery, SearchForm, TableQuery, get_monitor_page,
                get_monitor_table, parse_date_input, post_refresh, post_search,
            },
        },
        pagination::PaginationConfig,
        profile::AdminProfile,
        test_utils::{
            FakeTransactionRepository, SharedClock, assert_hx_endpoint, assert_hx_redirect,
            assert_valid_html, must_get_form, parse_html_document, parse_html_fragment,
        },
        timezone::ReferenceZone,
        transaction::test_records::record,
    };

    struct Fixture {
        state: MonitorPageState,
        repository: Arc<FakeTransactionRepository>,
        connected: watch::Sender<bool>,
    }

    fn fixture(role: Role, profile: AdminProfile) -> Fixture {
        let repository = Arc::new(FakeTransactionRepository::with_records(vec![
            record(Some("a"), 10.0, "2024-01-02T08:00:00-05:00"),
            record(Some("b"), 20.5, "2024-01-02T08:30:00-05:00"),
        ]));
        let alerts = Arc::new(AlertLog::new());
        // 2024-01-02 09:00 in Lima.
        let clock = Arc::new(SharedClock::new(datetime!(2024-01-02 14:00 UTC)));
        let monitor = MonitorSession::new(
            "admin-1",
            role,
            ReferenceZone::default(),
            clock,
            repository.clone(),
            alerts.clone(),
            10,
        );

        let mut store = AuthStore::new();
        store.set_user(Some(SignedInUser::Platform {
            id: "admin-1".to_owned(),
            email: None,
        }));
        store.set_role(Some(role));
        store.set_loading(false);

        let (connected, connection) = watch::channel(false);

        Fixture {
            state: MonitorPageState {
                monitor: Some(monitor),
                auth_store: Arc::new(RwLock::new(store)),
                alerts,
                profile,
                connection,
                pagination_config: PaginationConfig::default(),
            },
            repository,
            connected,
        }
    }

    fn admin_profile(show_filters: bool) -> AdminProfile {
        AdminProfile {
            name: Some("Bodega Rosa".to_owned()),
            search_filter: Some(show_filters),
        }
    }

    #[test]
    fn date_inputs_parse_or_count_as_missing() {
        assert_eq!(Some(date!(2024 - 01 - 02)), parse_date_input("2024-01-02"));
        assert_eq!(None, parse_date_input(""));
        assert_eq!(None, parse_date_input("02/01/2024"));
    }

    #[tokio::test]
    async fn page_shows_header_filters_and_rows() {
        let fixture = fixture(Role::Admin, admin_profile(true));
        let monitor = fixture.state.monitor.clone().unwrap();
        monitor.refresh_today().await;
        fixture.connected.send(true).unwrap();

        let response = get_monitor_page(State(fixture.state), Query(MonitorQuery::default())).await;

        assert_eq!(StatusCode::OK, response.status());
        let html = parse_html_document(response).await;
        assert_valid_html(&html);

        let heading = html
            .select(&Selector::parse("h1").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>();
        assert!(heading.contains("Bodega Rosa"), "got {heading}");

        let form = must_get_form(&html);
        assert_hx_endpoint(&form, endpoints::MONITOR_SEARCH, "hx-post");

        let rows = html
            .select(&Selector::parse("#monitor-table tbody tr").unwrap())
            .count();
        assert_eq!(2, rows);

        let summary = html
            .select(&Selector::parse("#monitor-summary").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>();
        assert!(summary.contains("CONECTADO"));
        assert!(!summary.contains("NO CONECTADO"));
        assert!(summary.contains("2 Registros"));
        assert!(summary.contains("S/ 30.50"), "got {summary}");
    }

    #[tokio::test]
    async fn hidden_filters_show_refresh_button() {
        let fixture = fixture(Role::Admin, admin_profile(false));

        let response = get_monitor_page(State(fixture.state), Query(MonitorQuery::default())).await;

        let html = parse_html_document(response).await;
        assert_eq!(0, html.select(&Selector::parse("form").unwrap()).count());
        let button = html
            .select(&Selector::parse(&format!("button[hx-post='{}']", endpoints::MONITOR_REFRESH)).unwrap())
            .next()
            .expect("no refresh button");
        assert_eq!("Actualizar Hoy", button.text().collect::<String>().trim());
    }

    #[tokio::test]
    async fn helpers_never_see_filters() {
        let fixture = fixture(Role::Helper, admin_profile(true));

        let response = get_monitor_page(State(fixture.state), Query(MonitorQuery::default())).await;

        let html = parse_html_document(response).await;
        assert_eq!(0, html.select(&Selector::parse("form").unwrap()).count());
    }

    #[tokio::test]
    async fn page_query_searches_range() {
        let fixture = fixture(Role::Admin, admin_profile(true));

        let response = get_monitor_page(
            State(fixture.state.clone()),
            Query(MonitorQuery {
                start: Some("2024-01-01".to_owned()),
                end: Some("2024-01-02".to_owned()),
                page: None,
            }),
        )
        .await;

        assert_eq!(StatusCode::OK, response.status());
        let calls = fixture.repository.calls();
        assert_eq!(1, calls.len());
        assert_eq!(datetime!(2024-01-01 00:00 -5), calls[0].1);
    }

    #[tokio::test]
    async fn invalid_page_query_shows_alert() {
        let fixture = fixture(Role::Admin, admin_profile(true));

        let response = get_monitor_page(
            State(fixture.state),
            Query(MonitorQuery {
                start: Some("2024-01-05".to_owned()),
                end: Some("2024-01-01".to_owned()),
                page: None,
            }),
        )
        .await;

        let html = parse_html_document(response).await;
        let alerts = html
            .select(&Selector::parse("#alert-container").unwrap())
            .next()
            .unwrap()
            .text()
            .collect::<String>();
        assert!(alerts.contains("La fecha de inicio no puede ser mayor a la fecha fin"));
        assert!(fixture.repository.calls().is_empty());
    }

    #[tokio::test]
    async fn signed_out_monitor_is_unauthorized() {
        let fixture = fixture(Role::Admin, admin_profile(true));
        fixture.state.monitor.as_ref().unwrap().close();

        let response = get_monitor_page(State(fixture.state), Query(MonitorQuery::default())).await;

        assert_eq!(StatusCode::UNAUTHORIZED, response.status());
    }

    #[tokio::test]
    async fn no_monitor_is_not_found() {
        let mut fixture = fixture(Role::Admin, admin_profile(true));
        fixture.state.monitor = None;

        let response = get_monitor_table(State(fixture.state), Query(TableQuery::default())).await;

        assert_eq!(StatusCode::NOT_FOUND, response.status());
    }

    #[tokio::test]
    async fn table_partial_carries_summary_and_alerts() {
        let fixture = fixture(Role::Admin, admin_profile(true));
        let monitor = fixture.state.monitor.clone().unwrap();
        monitor.refresh_today().await;
        fixture.state.alerts.success("Conectado");

        let response = get_monitor_table(State(fixture.state.clone()), Query(TableQuery::default())).await;

        assert_eq!(StatusCode::OK, response.status());
        let html = parse_html_fragment(response).await;
        let table = html
            .select(&Selector::parse("#monitor-table").unwrap())
            .next()
            .expect("no table");
        assert_eq!(Some(endpoints::MONITOR_TABLE), table.value().attr("hx-get"));
        assert_eq!(Some("every 3s"), table.value().attr("hx-trigger"));
        assert_eq!(Some("off"), table.value().attr("data-sound"));

        let summary = html
            .select(&Selector::parse("#monitor-summary").unwrap())
            .next()
            .expect("no summary");
        assert_eq!(Some("true"), summary.value().attr("hx-swap-oob"));

        let alerts = html
            .select(&Selector::parse("[hx-swap-oob='beforeend:#alert-container']").unwrap())
            .count();
        assert_eq!(1, alerts);
        assert!(fixture.state.alerts.drain().is_empty());
    }

    #[tokio::test]
    async fn live_insert_is_highlighted_in_partial() {
        let fixture = fixture(Role::Admin, admin_profile(true));
        let monitor = fixture.state.monitor.clone().unwrap();
        monitor.refresh_today().await;
        monitor
            .accept_live(record(Some("live-1"), 5.0, "2024-01-02T09:00:00-05:00"))
            .unwrap();

        let response = get_monitor_table(State(fixture.state), Query(TableQuery::default())).await;

        let html = parse_html_fragment(response).await;
        let table = html
            .select(&Selector::parse("#monitor-table").unwrap())
            .next()
            .unwrap();
        assert_eq!(Some("live-1"), table.value().attr("data-highlight"));
        let first_row = html
            .select(&Selector::parse("tbody tr").unwrap())
            .next()
            .unwrap();
        assert_eq!(Some("live-1"), first_row.value().attr("data-id"));
    }

    #[tokio::test]
    async fn search_redirects_to_monitor() {
        let fixture = fixture(Role::Admin, admin_profile(true));

        let response = post_search(
            State(fixture.state),
            Form(SearchForm {
                start: "2024-01-01".to_owned(),
                end: "2024-01-02".to_owned(),
            }),
        )
        .await;

        assert_eq!(StatusCode::SEE_OTHER, response.status());
        assert_hx_redirect(&response, endpoints::MONITOR_VIEW);
        assert_eq!(1, fixture.repository.calls().len());
    }

    #[tokio::test]
    async fn search_without_dates_is_bad_request() {
        let fixture = fixture(Role::Admin, admin_profile(true));

        let response = post_search(State(fixture.state), Form(SearchForm::default())).await;

        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        let html = parse_html_fragment(response).await;
        let text = html.root_element().text().collect::<String>();
        assert!(text.contains("Seleccione ambas fechas"), "got {text}");
    }

    #[tokio::test]
    async fn refresh_reloads_today() {
        let fixture = fixture(Role::Helper, admin_profile(true));

        let response = post_refresh(State(fixture.state)).await;

        assert_eq!(StatusCode::SEE_OTHER, response.status());
        let calls = fixture.repository.calls();
        assert_eq!(1, calls.len());
        assert_eq!(datetime!(2024-01-02 00:00 -5), calls[0].1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_rows_and_alerts() {
        let fixture = fixture(Role::Admin, admin_profile(false));
        let monitor = fixture.state.monitor.clone().unwrap();
        monitor.refresh_today().await;
        fixture
            .repository
            .fail_next(Error::Http("timeout".to_owned()));

        post_refresh(State(fixture.state.clone())).await;
        let response = get_monitor_table(State(fixture.state), Query(TableQuery::default())).await;

        let html = parse_html_fragment(response).await;
        assert_eq!(2, html.select(&Selector::parse("tbody tr").unwrap()).count());
        let text = html.root_element().text().collect::<String>();
        assert!(text.contains("Error al cargar transacciones"));
    }
}
