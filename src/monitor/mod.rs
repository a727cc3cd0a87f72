//! The payment monitor: the merged list of historical and live transactions
//! and the page that shows it.

mod buffer;
mod page;
mod session;

pub use buffer::{FetchTicket, LiveOutcome, MergeBuffer};
pub use page::{get_monitor_page, get_monitor_table, post_refresh, post_search};
pub use session::{MonitorSession, MonitorSnapshot};
