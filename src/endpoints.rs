//! The URIs of the server's pages and API endpoints.

/// The root route which redirects to the home page of the configured role.
pub const ROOT: &str = "/";
/// The payment monitor page.
pub const MONITOR_VIEW: &str = "/monitor";
/// The monitor table fragment, polled for updates.
pub const MONITOR_TABLE: &str = "/monitor/table";
/// Searches a date range on the monitor.
pub const MONITOR_SEARCH: &str = "/monitor/search";
/// Shows today again on the monitor.
pub const MONITOR_REFRESH: &str = "/monitor/refresh";
/// Downloads the visible transactions as CSV.
pub const MONITOR_EXPORT: &str = "/monitor/export";
/// The distributor's client list.
pub const DISTRIBUTOR_CLIENTS_VIEW: &str = "/distribuidor/clientes";

/// Turns the new-transaction sound on or off.
pub const SOUND_PREFERENCE: &str = "/api/preferences/sound";
/// Collapses or expands the sidebar.
pub const SIDEBAR_PREFERENCE: &str = "/api/preferences/sidebar";
/// Ends the session.
pub const LOG_OUT: &str = "/api/log_out";
/// Changes the distributor's referral code.
pub const DISTRIBUTOR_REFERRAL_CODE: &str = "/api/distribuidor/codigo";
/// Receives the platform's database webhooks for inserted transactions.
pub const TRANSACTION_WEBHOOK: &str = "/api/webhooks/transactions";

/// Build the monitor table URL for `page`.
pub fn monitor_table_page(page: u64) -> String {
    format!("{MONITOR_TABLE}?page={page}")
}
