//! Reconnection controller: the task that owns the connection state machine.
//!
//! Every state change happens inside [`Controller::run`], one event at a time:
//! caller commands, connect attempt outcomes, transport events and timer
//! firings all arrive over channels and are handled sequentially, so no state
//! is shared with other tasks.
//!
//! ```text
//! Disconnected --connect/subscribe--> Connecting --open--> Connected
//!      ^                                  |                    |
//!      +------ failure (retry armed) -----+---- unclean close -+
//!      |
//!      +-- retries exhausted --> Error --reconnect()/connect()--> Disconnected
//! ```

use super::heartbeat::HeartbeatMonitor;
use super::registry::{Subscription, SubscriptionInfo, SubscriptionRegistry};
use super::router;
use super::scheduler::{Scheduler, TimerFired, TimerKind};
use super::transport::{Connector, LinkSender, TransportEvent, TransportLink};
use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::types::{ConnectionStatus, OutboundFrame, SubscriptionId};
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use url::Url;

/// Pause between a caller-requested reconnect and the fresh attempt.
pub(crate) const RECONNECT_PAUSE: Duration = Duration::from_millis(100);

pub(crate) enum Command {
    Connect {
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Reconnect {
        reply: oneshot::Sender<Result<()>>,
    },
    Subscribe(Subscription),
    Unsubscribe(SubscriptionId),
    Snapshot {
        reply: oneshot::Sender<Vec<SubscriptionInfo>>,
    },
}

pub(crate) enum Event {
    AttemptFinished {
        generation: u64,
        outcome: Result<TransportLink>,
    },
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    Timer(TimerFired),
}

impl From<TimerFired> for Event {
    fn from(fired: TimerFired) -> Self {
        Event::Timer(fired)
    }
}

/// The live socket plus the task forwarding its events.
struct ActiveLink {
    sender: LinkSender,
    forwarder: JoinHandle<()>,
}

pub(crate) struct Controller {
    url: Url,
    config: RealtimeConfig,
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    heartbeat: HeartbeatMonitor,
    scheduler: Scheduler<Event>,
    status: watch::Sender<ConnectionStatus>,
    events_tx: mpsc::UnboundedSender<Event>,
    link: Option<ActiveLink>,
    attempt: Option<JoinHandle<()>>,
    retry_count: u32,
    backoff_base: Duration,
    waiters: Vec<oneshot::Sender<Result<()>>>,
}

impl Controller {
    pub fn new(
        url: Url,
        config: RealtimeConfig,
        connector: Arc<dyn Connector>,
        status: watch::Sender<ConnectionStatus>,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            url,
            heartbeat: HeartbeatMonitor::new(config.heartbeat_interval()),
            backoff_base: config.base_backoff(),
            scheduler: Scheduler::new(events_tx.clone()),
            config,
            connector,
            registry: SubscriptionRegistry::new(),
            status,
            events_tx,
            link: None,
            attempt: None,
            retry_count: 0,
            waiters: Vec::new(),
        }
    }

    /// Processes events until every manager handle is dropped.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
        info!("[Controller] All handles dropped, shutting down.");
        self.teardown(ConnectionStatus::Disconnected, "manager dropped");
    }

    fn current(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn set_status(&self, next: ConnectionStatus) {
        let previous = self.status.send_replace(next);
        if previous != next {
            info!("[Controller] {} -> {}", previous, next);
        }
    }

    // --- Commands ---

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => self.on_connect(reply),
            Command::Disconnect { reply } => {
                self.on_disconnect();
                let _ = reply.send(());
            }
            Command::Reconnect { reply } => self.on_reconnect(reply),
            Command::Subscribe(subscription) => self.on_subscribe(subscription),
            Command::Unsubscribe(id) => self.on_unsubscribe(&id),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.registry.snapshot());
            }
        }
    }

    fn on_connect(&mut self, reply: oneshot::Sender<Result<()>>) {
        match self.current() {
            ConnectionStatus::Connected => {
                let _ = reply.send(Ok(()));
            }
            ConnectionStatus::Connecting => {
                debug!("[Controller] Joining in-flight connection attempt.");
                self.waiters.push(reply);
            }
            ConnectionStatus::Disconnected if self.scheduler.is_pending(TimerKind::Restart) => {
                self.waiters.push(reply);
            }
            ConnectionStatus::Disconnected => {
                self.waiters.push(reply);
                self.begin_attempt();
            }
            // Leaving Error always restarts from Disconnected with fresh backoff.
            ConnectionStatus::Error => self.on_reconnect(reply),
        }
    }

    fn on_disconnect(&mut self) {
        info!("[Controller] Explicit disconnect requested.");
        let removed = self.registry.clear();
        self.teardown(ConnectionStatus::Disconnected, "disconnect requested");
        info!(
            "[Controller] Disconnected; cleared {} subscription(s).",
            removed
        );
    }

    fn on_reconnect(&mut self, reply: oneshot::Sender<Result<()>>) {
        info!(
            "[Controller] Reconnect requested; restarting in {:?}.",
            RECONNECT_PAUSE
        );
        self.scheduler.advance();
        self.drop_attempt();
        self.close_link();
        self.retry_count = 0;
        self.backoff_base = self.config.base_backoff();
        self.set_status(ConnectionStatus::Disconnected);
        self.waiters.push(reply);
        self.scheduler.schedule(TimerKind::Restart, RECONNECT_PAUSE);
    }

    fn on_subscribe(&mut self, subscription: Subscription) {
        debug!(
            "[Controller] Registering {:?} subscription {}",
            subscription.kind(),
            subscription.id
        );
        if self.current() == ConnectionStatus::Connected {
            self.send_frame(&OutboundFrame::subscribe(
                &subscription.id,
                &subscription.params,
            ));
        }
        self.registry.insert(subscription);

        if self.current() == ConnectionStatus::Disconnected && !self.retry_armed() {
            self.begin_attempt();
        }
    }

    fn on_unsubscribe(&mut self, id: &SubscriptionId) {
        match self.registry.remove(id) {
            Some(_) => {
                debug!("[Controller] Removed subscription {}", id);
                if self.current() == ConnectionStatus::Connected {
                    self.send_frame(&OutboundFrame::unsubscribe(id));
                }
            }
            None => trace!("[Controller] Unsubscribe for unknown id {} ignored", id),
        }
    }

    // --- Internal events ---

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::AttemptFinished {
                generation,
                outcome,
            } => self.on_attempt_finished(generation, outcome),
            Event::Transport { generation, event } => self.on_transport_event(generation, event),
            Event::Timer(fired) => self.on_timer(fired),
        }
    }

    fn on_attempt_finished(&mut self, generation: u64, outcome: Result<TransportLink>) {
        if generation != self.scheduler.generation()
            || self.current() != ConnectionStatus::Connecting
        {
            debug!(
                "[Controller] Discarding outcome of abandoned attempt (generation {}).",
                generation
            );
            if let Ok(link) = outcome {
                link.sender.close();
            }
            return;
        }
        self.attempt = None;

        match outcome {
            Ok(link) => self.on_open(link),
            Err(e) => {
                error!("[Controller] Failed to establish connection: {}", e);
                self.set_status(ConnectionStatus::Disconnected);
                self.schedule_retry(e);
            }
        }
    }

    fn on_open(&mut self, link: TransportLink) {
        let TransportLink { sender, mut events } = link;
        let generation = self.scheduler.generation();
        let events_tx = self.events_tx.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if events_tx
                    .send(Event::Transport { generation, event })
                    .is_err()
                {
                    break;
                }
            }
        });
        self.link = Some(ActiveLink { sender, forwarder });

        self.retry_count = 0;
        self.backoff_base = self.config.base_backoff();
        self.set_status(ConnectionStatus::Connected);
        info!("[Controller] Connection established successfully.");

        // --- Resubscribe to registered topics ---
        if !self.registry.is_empty() {
            info!(
                "[Controller] Replaying {} subscription(s)...",
                self.registry.len()
            );
            let frames: Vec<OutboundFrame> = self
                .registry
                .iter()
                .map(|s| OutboundFrame::subscribe(&s.id, &s.params))
                .collect();
            for frame in &frames {
                self.send_frame(frame);
            }
        }

        self.heartbeat.start(&mut self.scheduler);
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Ok(()));
        }
    }

    fn on_transport_event(&mut self, generation: u64, event: TransportEvent) {
        if generation != self.scheduler.generation()
            || self.current() != ConnectionStatus::Connected
        {
            trace!("[Controller] Ignoring stale transport event: {:?}", event);
            return;
        }
        match event {
            TransportEvent::Message(text) => {
                router::dispatch(&text, &self.registry);
            }
            TransportEvent::Closed { code, reason } => {
                warn!(
                    "[Controller] Connection closed by peer (code {:?}, reason '{}').",
                    code, reason
                );
                self.on_connection_lost(RealtimeError::TransportError(format!(
                    "connection closed (code {:?}): {}",
                    code, reason
                )));
            }
            TransportEvent::Error(e) => {
                error!("[Controller] Transport error: {}", e);
                self.on_connection_lost(RealtimeError::TransportError(e));
            }
        }
    }

    fn on_connection_lost(&mut self, cause: RealtimeError) {
        self.heartbeat.stop(&mut self.scheduler);
        if let Some(link) = self.link.take() {
            link.forwarder.abort();
        }
        self.set_status(ConnectionStatus::Disconnected);
        self.schedule_retry(cause);
    }

    fn on_timer(&mut self, fired: TimerFired) {
        if !self.scheduler.accept(&fired) {
            return;
        }
        match fired.kind {
            TimerKind::Retry | TimerKind::Restart => {
                if self.current() == ConnectionStatus::Disconnected {
                    self.begin_attempt();
                }
            }
            TimerKind::Heartbeat => {
                if self.current() == ConnectionStatus::Connected {
                    if let Some(link) = &self.link {
                        self.heartbeat.beat(&link.sender, &mut self.scheduler);
                    }
                }
            }
        }
    }

    // --- Helpers ---

    fn begin_attempt(&mut self) {
        let generation = self.scheduler.advance();
        self.drop_attempt();
        self.set_status(ConnectionStatus::Connecting);
        info!(
            "[Controller] Attempting connection (generation {}, retry {})...",
            generation, self.retry_count
        );

        let connecting = self.connector.connect(&self.url);
        let timeout = self.config.connect_timeout();
        let events_tx = self.events_tx.clone();
        self.attempt = Some(tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, connecting).await {
                Ok(result) => result,
                Err(_) => Err(RealtimeError::ConnectionTimeout(timeout)),
            };
            let _ = events_tx.send(Event::AttemptFinished {
                generation,
                outcome,
            });
        }));
    }

    /// Arms the next backoff retry, or gives up once `max_retries` is spent.
    fn schedule_retry(&mut self, cause: RealtimeError) {
        if self.retry_count < self.config.max_retries {
            let delay = self
                .backoff_base
                .saturating_mul(2u32.saturating_pow(self.retry_count));
            warn!(
                "[Controller] Disconnected. Retry {}/{} in {:?}...",
                self.retry_count + 1,
                self.config.max_retries,
                delay
            );
            self.scheduler.schedule(TimerKind::Retry, delay);
            self.retry_count += 1;
            self.reject_waiters(&cause);
        } else {
            error!(
                "[Controller] Max retries ({}) reached. Stopping connection attempts.",
                self.config.max_retries
            );
            self.set_status(ConnectionStatus::Error);
            self.reject_waiters(&RealtimeError::MaxRetriesExceeded {
                attempts: self.retry_count + 1,
                last_error: cause.to_string(),
            });
        }
    }

    fn retry_armed(&self) -> bool {
        self.scheduler.is_pending(TimerKind::Retry) || self.scheduler.is_pending(TimerKind::Restart)
    }

    fn send_frame(&self, frame: &OutboundFrame) {
        let link = match &self.link {
            Some(link) if self.current() == ConnectionStatus::Connected => link,
            _ => {
                trace!("[Controller] Not connected, {:?} frame not sent.", frame.frame_type);
                return;
            }
        };
        match frame.to_text() {
            Ok(text) => link.sender.send_text(text),
            Err(e) => error!("[Controller] Failed to encode {:?} frame: {}", frame.frame_type, e),
        }
    }

    fn reject_waiters(&mut self, cause: &RealtimeError) {
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(cause.duplicate()));
        }
    }

    fn drop_attempt(&mut self) {
        if let Some(attempt) = self.attempt.take() {
            attempt.abort();
        }
    }

    fn close_link(&mut self) {
        if let Some(link) = self.link.take() {
            link.forwarder.abort();
            link.sender.close();
        }
    }

    /// Cancels timers and the in-flight attempt, closes the socket cleanly.
    fn teardown(&mut self, status: ConnectionStatus, reason: &str) {
        self.scheduler.advance();
        self.drop_attempt();
        self.close_link();
        self.retry_count = 0;
        self.backoff_base = self.config.base_backoff();
        self.set_status(status);
        self.reject_waiters(&RealtimeError::Cancelled(reason.to_string()));
    }
}
