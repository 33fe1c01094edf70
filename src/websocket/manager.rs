use super::controller::{Command, Controller};
use super::registry::{Subscription, SubscriptionCallback, SubscriptionInfo};
use super::transport::{Connector, WebsocketConnector};
use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::types::{ConnectionStatus, SubscriptionId, TopicParams};
use log::*;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};

/// Handle to the real-time update subsystem.
///
/// Construct one at application start and clone it wherever updates are
/// needed; all clones drive the same connection and subscription registry.
/// The background controller stops once the last clone is dropped.
///
/// Must be created from within a Tokio runtime.
#[derive(Clone)]
pub struct RealtimeManager {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
}

impl RealtimeManager {
    /// Creates a manager that talks to `config.url` over a real WebSocket.
    ///
    /// No connection is opened until [`connect`](Self::connect) or the first subscribe.
    pub fn new(config: RealtimeConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(WebsocketConnector))
    }

    /// Creates a manager on top of a custom [`Connector`].
    pub fn with_connector(config: RealtimeConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let url = config.validate()?;
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

        let controller = Controller::new(url, config, connector, status_tx, events_tx);
        tokio::spawn(controller.run(commands_rx, events_rx));

        Ok(Self {
            commands: commands_tx,
            status: status_rx,
        })
    }

    fn dispatch(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| RealtimeError::ManagerStopped)
    }

    /// Resolves once the socket is open. Concurrent calls share one attempt.
    ///
    /// From `Error` this behaves like [`reconnect`](Self::reconnect).
    pub async fn connect(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::Connect { reply })?;
        rx.await.map_err(|_| RealtimeError::ManagerStopped)?
    }

    /// Closes the connection cleanly and forgets every subscription.
    ///
    /// No automatic retry follows an explicit disconnect.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.dispatch(Command::Disconnect { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Drops the current connection (if any) and starts over with a fresh retry budget.
    ///
    /// Subscriptions are kept and replayed once the new connection opens.
    pub async fn reconnect(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(Command::Reconnect { reply })?;
        rx.await.map_err(|_| RealtimeError::ManagerStopped)?
    }

    /// Subscribes to hazard mention updates around a point.
    pub fn subscribe_to_location(
        &self,
        lat: f64,
        lng: f64,
        radius_km: f64,
        callback: SubscriptionCallback,
    ) -> SubscriptionId {
        self.subscribe(
            TopicParams::Location {
                lat,
                lng,
                radius_km,
            },
            callback,
        )
    }

    /// Subscribes to status updates for a single report.
    pub fn subscribe_to_report(
        &self,
        report_id: impl Into<String>,
        callback: SubscriptionCallback,
    ) -> SubscriptionId {
        self.subscribe(
            TopicParams::Report {
                report_id: report_id.into(),
            },
            callback,
        )
    }

    /// Subscribes to alerts and system status broadcasts.
    pub fn subscribe_to_global(&self, callback: SubscriptionCallback) -> SubscriptionId {
        self.subscribe(TopicParams::Global, callback)
    }

    /// Registers a subscription and returns its id immediately.
    ///
    /// The subscribe frame goes out now if connected, otherwise on the next open.
    pub fn subscribe(&self, params: TopicParams, callback: SubscriptionCallback) -> SubscriptionId {
        let subscription = Subscription::new(params, callback);
        let id = subscription.id.clone();
        if self.dispatch(Command::Subscribe(subscription)).is_err() {
            warn!("Realtime manager stopped; subscription {} not registered.", id);
        }
        id
    }

    /// Removes a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: &SubscriptionId) {
        let _ = self.dispatch(Command::Unsubscribe(id.clone()));
    }

    /// Returns true while the socket is open.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Returns the current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// A receiver for status changes. Like any `watch`, it only keeps the latest value.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// The registered subscriptions, in registration order.
    pub async fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        let (reply, rx) = oneshot::channel();
        if self.dispatch(Command::Snapshot { reply }).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }
}
