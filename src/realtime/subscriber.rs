//! Keeps one live subscription open for the current viewer.
//!
//! Re-subscribing is driven only by a change of viewer or credential source.
//! The handler lives in a [HandlerSlot] that can be replaced at any time
//! without touching the subscription, and every event is delivered to the
//! handler current at that moment.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, RwLock},
};

use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
};

use crate::{
    Error,
    alert::Notifier,
    auth::{CredentialResolver, CredentialSource},
    realtime::{Channel, ChannelEvent, ChannelStatus, InsertFilter, RealtimeTransport, channel_name},
    transaction::TransactionRecord,
};

/// The message shown when the subscription is confirmed.
pub const CONNECTED_MESSAGE: &str = "Conectado a notificaciones en tiempo real";

/// Receives each newly inserted transaction.
pub type TransactionHandler = Arc<dyn Fn(TransactionRecord) -> Result<(), Error> + Send + Sync>;

/// Holds the current handler, shared between the subscriber and its channel task.
#[derive(Clone)]
pub struct HandlerSlot(Arc<RwLock<TransactionHandler>>);

impl HandlerSlot {
    /// Create a slot holding `handler`.
    pub fn new(handler: TransactionHandler) -> Self {
        Self(Arc::new(RwLock::new(handler)))
    }

    /// Replace the handler. Events received from now on go to `handler`.
    pub fn replace(&self, handler: TransactionHandler) {
        match self.0.write() {
            Ok(mut current) => *current = handler,
            Err(poisoned) => *poisoned.into_inner() = handler,
        }
    }

    /// The current handler.
    pub fn current(&self) -> TransactionHandler {
        match self.0.read() {
            Ok(current) => current.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Hand `record` to the current handler.
    ///
    /// Errors and panics raised by the handler are logged and go no further.
    fn deliver(&self, record: TransactionRecord) {
        let handler = self.current();
        let id = record.id.clone();

        match catch_unwind(AssertUnwindSafe(|| handler(record))) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::error!("Error processing realtime transaction {id:?}: {error}");
            }
            Err(_) => {
                tracing::error!("the handler panicked while processing realtime transaction {id:?}");
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SubscriptionKey {
    viewer_id: String,
    source: CredentialSource,
}

struct ActiveSubscription {
    key: SubscriptionKey,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Maintains at most one channel per viewer and delivers its inserts.
pub struct RealtimeSubscriber<T: RealtimeTransport> {
    transport: Arc<T>,
    notifier: Arc<dyn Notifier>,
    handler: HandlerSlot,
    connected: Arc<watch::Sender<bool>>,
    active: Option<ActiveSubscription>,
}

impl<T: RealtimeTransport> RealtimeSubscriber<T> {
    /// Create a subscriber that is not subscribed to anything yet.
    pub fn new(transport: Arc<T>, notifier: Arc<dyn Notifier>, handler: TransactionHandler) -> Self {
        Self {
            transport,
            notifier,
            handler: HandlerSlot::new(handler),
            connected: Arc::new(watch::Sender::new(false)),
            active: None,
        }
    }

    /// Replace the handler without re-subscribing.
    pub fn set_handler(&self, handler: TransactionHandler) {
        self.handler.replace(handler);
    }

    /// Whether the transport has confirmed the current subscription.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Watch the connection state.
    pub fn connection(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// The viewer currently subscribed to, if any.
    pub fn viewer_id(&self) -> Option<&str> {
        self.active
            .as_ref()
            .map(|active| active.key.viewer_id.as_str())
    }

    /// Subscribe to the transactions inserted for `viewer_id`.
    ///
    /// Subscribing again for the same viewer and credential source keeps the
    /// existing channel. Any other change closes the previous channel before
    /// the new one is opened. Without a viewer, the subscriber only closes its
    /// channel and stays disconnected.
    ///
    /// # Errors
    /// Returns:
    /// - [Error::NoSession] if `credentials` has no token to present,
    /// - [Error::Transport] if the transport rejects the token or the channel.
    ///
    /// In both cases no channel is left open and the subscriber stays disconnected.
    pub async fn subscribe(
        &mut self,
        viewer_id: Option<&str>,
        credentials: &dyn CredentialResolver,
    ) -> Result<(), Error> {
        let Some(viewer_id) = viewer_id else {
            self.unsubscribe().await;
            return Ok(());
        };

        let key = SubscriptionKey {
            viewer_id: viewer_id.to_owned(),
            source: credentials.source(),
        };

        if self.active.as_ref().is_some_and(|active| active.key == key) {
            tracing::debug!("already subscribed to the transactions of {viewer_id}");
            return Ok(());
        }

        self.unsubscribe().await;

        let Some(token) = credentials.access_token().await else {
            tracing::warn!("no access token for {viewer_id}, not opening a realtime channel");
            return Err(Error::NoSession);
        };

        self.transport.set_auth(&token).await?;

        let name = channel_name(viewer_id);
        let channel = self
            .transport
            .open_channel(&name, InsertFilter::for_viewer(viewer_id))
            .await
            .inspect_err(|error| tracing::error!("could not open realtime channel {name}: {error}"))?;
        tracing::info!("opened realtime channel {name}");

        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(run_channel(
            channel,
            stopped,
            self.handler.clone(),
            self.connected.clone(),
            self.notifier.clone(),
        ));

        self.active = Some(ActiveSubscription { key, stop, task });

        Ok(())
    }

    /// Close the current channel, if any, and wait for it to be released.
    pub async fn unsubscribe(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        let _ = active.stop.send(());

        if let Err(error) = active.task.await {
            tracing::error!(
                "the realtime channel task for {} failed: {error}",
                active.key.viewer_id
            );
        }

        self.connected.send_replace(false);
        tracing::info!(
            "closed the realtime channel for {}",
            active.key.viewer_id
        );
    }
}

/// Pump a channel's events until it ends or `stopped` fires, then close it.
///
/// Dropping the subscriber drops the stop sender, which also ends the pump.
async fn run_channel<C: Channel>(
    mut channel: C,
    mut stopped: oneshot::Receiver<()>,
    handler: HandlerSlot,
    connected: Arc<watch::Sender<bool>>,
    notifier: Arc<dyn Notifier>,
) {
    let mut announced = false;

    loop {
        tokio::select! {
            _ = &mut stopped => break,
            event = channel.next_event() => match event {
                Some(ChannelEvent::Status(ChannelStatus::Subscribed)) => {
                    connected.send_replace(true);
                    tracing::info!("realtime channel {} subscribed", channel.name());

                    if !announced {
                        notifier.success(CONNECTED_MESSAGE);
                        announced = true;
                    }
                }
                Some(ChannelEvent::Status(status @ (ChannelStatus::ChannelError | ChannelStatus::TimedOut))) => {
                    connected.send_replace(false);
                    tracing::error!("realtime channel {} reported {status:?}", channel.name());
                }
                Some(ChannelEvent::Status(ChannelStatus::Closed)) => {
                    connected.send_replace(false);
                    tracing::debug!("realtime channel {} closed by the transport", channel.name());
                }
                Some(ChannelEvent::Insert(record)) => handler.deliver(record),
                None => {
                    tracing::debug!("realtime channel {} ended", channel.name());
                    break;
                }
            },
        }
    }

    connected.send_replace(false);
    channel.close().await;
}
