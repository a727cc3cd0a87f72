//! An in-process realtime transport.
//!
//! Inserted records are published to the transport (by the webhook endpoint in
//! the server) and fanned out to every open channel whose filter they pass.
//! The transport also keeps a record of the tokens it was given and the
//! channels opened and closed on it.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{
    Error,
    realtime::{Channel, ChannelEvent, ChannelStatus, InsertFilter, RealtimeTransport},
    transaction::TransactionRecord,
};

struct OpenChannel {
    name: String,
    filter: InsertFilter,
    events: UnboundedSender<ChannelEvent>,
}

#[derive(Default)]
struct TransportState {
    next_channel_id: u64,
    channels: HashMap<u64, OpenChannel>,
    token: Option<String>,
    auth_tokens: Vec<String>,
    opened: Vec<String>,
    closed: Vec<String>,
    withhold_acknowledgement: bool,
}

/// The in-process transport. Cloning shares the same channels.
///
/// A token must be set with [RealtimeTransport::set_auth] before a channel
/// opens, but its value is only recorded, never verified. Inserts only reach
/// this transport through the webhook endpoint, which is authorized by the
/// shared webhook secret, so the channel token is not an access boundary here.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<TransportState>>,
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("open_channels", &self.open_channel_names())
            .finish()
    }
}

impl MemoryTransport {
    /// Create a transport with no open channels.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, TransportState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Deliver an inserted record to the channels it passes the filter of.
    ///
    /// Returns the number of channels it was delivered to.
    pub fn publish(&self, schema: &str, table: &str, record: &TransactionRecord) -> usize {
        let state = self.lock();
        let mut delivered = 0;

        for channel in state.channels.values() {
            if channel.filter.matches(schema, table, record)
                && channel
                    .events
                    .send(ChannelEvent::Insert(record.clone()))
                    .is_ok()
            {
                delivered += 1;
            }
        }

        tracing::debug!(
            "published transaction {:?} to {delivered} channel(s)",
            record.id
        );

        delivered
    }

    /// Report `status` on every open channel.
    pub fn broadcast_status(&self, status: ChannelStatus) {
        let state = self.lock();

        for channel in state.channels.values() {
            let _ = channel.events.send(ChannelEvent::Status(status));
        }
    }

    /// Stop confirming new subscriptions, leaving new channels unacknowledged.
    pub fn withhold_acknowledgement(&self, withhold: bool) {
        self.lock().withhold_acknowledgement = withhold;
    }

    /// The tokens passed to [RealtimeTransport::set_auth], oldest first.
    pub fn auth_tokens(&self) -> Vec<String> {
        self.lock().auth_tokens.clone()
    }

    /// The names of the channels currently open.
    pub fn open_channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .lock()
            .channels
            .values()
            .map(|channel| channel.name.clone())
            .collect();
        names.sort();
        names
    }

    /// The names of every channel ever opened, in order.
    pub fn opened_channel_names(&self) -> Vec<String> {
        self.lock().opened.clone()
    }

    /// The names of every channel closed, in order.
    pub fn closed_channel_names(&self) -> Vec<String> {
        self.lock().closed.clone()
    }

    fn release(&self, id: u64) {
        let mut state = self.lock();

        if let Some(channel) = state.channels.remove(&id) {
            tracing::debug!("closed realtime channel {}", channel.name);
            state.closed.push(channel.name);
        }
    }
}

#[async_trait]
impl RealtimeTransport for MemoryTransport {
    type Channel = MemoryChannel;

    async fn set_auth(&self, token: &str) -> Result<(), Error> {
        if token.is_empty() {
            return Err(Error::Transport("empty access token".to_owned()));
        }

        let mut state = self.lock();
        state.token = Some(token.to_owned());
        state.auth_tokens.push(token.to_owned());

        Ok(())
    }

    async fn open_channel(&self, name: &str, filter: InsertFilter) -> Result<MemoryChannel, Error> {
        let mut state = self.lock();

        if state.token.is_none() {
            return Err(Error::Transport(format!(
                "cannot open channel {name} without an access token"
            )));
        }

        if state.channels.values().any(|channel| channel.name == name) {
            tracing::warn!("channel {name} is already open");
            return Err(Error::Transport(format!("channel {name} is already open")));
        }

        let (sender, receiver) = unbounded_channel();

        if !state.withhold_acknowledgement {
            let _ = sender.send(ChannelEvent::Status(ChannelStatus::Subscribed));
        }

        let id = state.next_channel_id;
        state.next_channel_id += 1;
        state.channels.insert(
            id,
            OpenChannel {
                name: name.to_owned(),
                filter,
                events: sender,
            },
        );
        state.opened.push(name.to_owned());
        tracing::debug!("opened realtime channel {name}");

        Ok(MemoryChannel {
            id,
            name: name.to_owned(),
            events: receiver,
            transport: self.clone(),
        })
    }
}

/// A channel opened on a [MemoryTransport].
pub struct MemoryChannel {
    id: u64,
    name: String,
    events: UnboundedReceiver<ChannelEvent>,
    transport: MemoryTransport,
}

#[async_trait]
impl Channel for MemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    async fn close(self) {
        self.transport.release(self.id);
    }
}
