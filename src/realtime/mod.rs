//! Live notification of newly inserted transactions.
//!
//! The transport is an external collaborator: it opens named channels, filters
//! inserted rows on the server side and reports the channel's status. The
//! [RealtimeSubscriber] keeps at most one channel open for the current viewer
//! and hands each inserted record to the current handler.

mod memory;
mod subscriber;

use async_trait::async_trait;

use crate::{Error, transaction::TransactionRecord};

pub use memory::{MemoryChannel, MemoryTransport};
pub use subscriber::{HandlerSlot, RealtimeSubscriber, TransactionHandler};

/// The schema holding the transactions table.
pub const TRANSACTION_SCHEMA: &str = "notificacion";
/// The table payment notifications are inserted into.
pub const TRANSACTION_TABLE: &str = "transacciones";
/// The column naming the viewer that owns a transaction.
pub const OWNER_COLUMN: &str = "id_usuario";

/// The deterministic channel name for a viewer's transactions.
pub fn channel_name(viewer_id: &str) -> String {
    format!("transacciones-{viewer_id}")
}

/// A server-side predicate selecting inserted rows whose column equals a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertFilter {
    /// The schema of the watched table.
    pub schema: String,
    /// The watched table.
    pub table: String,
    /// The column compared against `value`.
    pub column: String,
    /// The value the column must equal.
    pub value: String,
}

impl InsertFilter {
    /// Select the transactions owned by `viewer_id`.
    pub fn for_viewer(viewer_id: &str) -> Self {
        Self {
            schema: TRANSACTION_SCHEMA.to_owned(),
            table: TRANSACTION_TABLE.to_owned(),
            column: OWNER_COLUMN.to_owned(),
            value: viewer_id.to_owned(),
        }
    }

    /// The filter in the platform's `column=eq.value` syntax.
    pub fn as_row_filter(&self) -> String {
        format!("{}=eq.{}", self.column, self.value)
    }

    /// Whether a record inserted into `schema.table` passes the filter.
    pub fn matches(&self, schema: &str, table: &str, record: &TransactionRecord) -> bool {
        self.schema == schema
            && self.table == table
            && self.column == OWNER_COLUMN
            && record.owner_id == self.value
    }
}

/// The status vocabulary reported by a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelStatus {
    /// The transport confirmed the subscription.
    Subscribed,
    /// The channel failed.
    ChannelError,
    /// The subscription was not confirmed in time.
    TimedOut,
    /// The channel was closed by the transport.
    Closed,
}

/// Something that happened on a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The channel's status changed.
    Status(ChannelStatus),
    /// A row passing the channel's filter was inserted.
    Insert(TransactionRecord),
}

/// An open subscription channel.
#[async_trait]
pub trait Channel: Send + 'static {
    /// The channel's name.
    fn name(&self) -> &str;

    /// Wait for the next event. `None` means the channel will produce no more events.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Close the channel, releasing it on the transport.
    async fn close(self);
}

/// The platform's realtime change feed.
#[async_trait]
pub trait RealtimeTransport: Send + Sync + 'static {
    /// The channels opened by this transport.
    type Channel: Channel;

    /// Set the access token presented for channels opened from now on.
    ///
    /// # Errors
    /// Returns an error if the transport rejects the token.
    async fn set_auth(&self, token: &str) -> Result<(), Error>;

    /// Open a channel named `name` receiving rows that pass `filter`.
    ///
    /// # Errors
    /// Returns an error if the channel could not be opened, e.g. because a
    /// channel with the same name is already open.
    async fn open_channel(&self, name: &str, filter: InsertFilter) -> Result<Self::Channel, Error>;
}
