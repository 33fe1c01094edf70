// tests/common.rs
//
// In-memory transport used by the integration tests. Each accepted connection
// hands a `ServerSide` to the test so it can inspect outbound frames and push
// inbound ones.

use futures_util::future::{self, BoxFuture};
use futures_util::FutureExt;
use hazard_realtime::websocket::{Connector, Outbound, TransportEvent, TransportLink};
use hazard_realtime::{InboundMessage, RealtimeConfig, RealtimeError, RealtimeManager, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};
use url::Url;

static INIT: Once = Once::new();

pub const TEST_URL: &str = "ws://realtime.test/ws";

pub fn setup() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        env_logger::builder().is_test(true).try_init().ok();
    });
}

/// What the fake server does with the next connection attempt.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy)]
pub enum Plan {
    Accept,
    AcceptAfter(Duration),
    Refuse,
    Hang,
}

/// The server's end of one accepted connection.
pub struct ServerSide {
    outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

#[allow(dead_code)]
impl ServerSide {
    pub fn push(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    /// Simulates an abnormal close (network drop).
    pub fn drop_connection(&self) {
        let _ = self.events.send(TransportEvent::Closed {
            code: Some(1006),
            reason: "abnormal closure".to_string(),
        });
    }

    pub fn fail(&self, error: &str) {
        let _ = self.events.send(TransportEvent::Error(error.to_string()));
    }

    /// Drains everything the client has written so far.
    pub fn drain(&mut self) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(msg) = self.outbound.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Drains and decodes the text frames written so far.
    pub fn frames(&mut self) -> Vec<Value> {
        self.drain()
            .into_iter()
            .filter_map(|msg| match msg {
                Outbound::Text(text) => {
                    Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
                }
                _ => None,
            })
            .collect()
    }
}

struct ConnectorState {
    plans: VecDeque<Plan>,
    fallback: Plan,
    attempts: Vec<Instant>,
}

#[derive(Clone)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ConnectorState>>,
    servers: mpsc::UnboundedSender<ServerSide>,
}

#[allow(dead_code)]
impl ScriptedConnector {
    /// Returns the connector and the stream of accepted server sides.
    pub fn new(
        plans: Vec<Plan>,
        fallback: Plan,
    ) -> (Self, mpsc::UnboundedReceiver<ServerSide>) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(ConnectorState {
                plans: plans.into(),
                fallback,
                attempts: Vec::new(),
            })),
            servers,
        };
        (connector, accepted)
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.state.lock().unwrap().attempts.clone()
    }

    /// Delays between consecutive attempts, in milliseconds.
    pub fn attempt_gaps_ms(&self) -> Vec<u128> {
        self.attempts()
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect()
    }

    pub fn set_fallback(&self, plan: Plan) {
        self.state.lock().unwrap().fallback = plan;
    }

    fn accept(&self) -> TransportLink {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let _ = self.servers.send(ServerSide {
            outbound: outbound_rx,
            events: event_tx,
        });
        TransportLink::new(outbound_tx, event_rx)
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self, _url: &Url) -> BoxFuture<'static, Result<TransportLink>> {
        let plan = {
            let mut state = self.state.lock().unwrap();
            state.attempts.push(Instant::now());
            let fallback = state.fallback;
            state.plans.pop_front().unwrap_or(fallback)
        };
        match plan {
            Plan::Accept => future::ready(Ok(self.accept())).boxed(),
            Plan::AcceptAfter(delay) => {
                let connector = self.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    Ok(connector.accept())
                }
                .boxed()
            }
            Plan::Refuse => future::ready(Err(RealtimeError::TransportError(
                "connection refused".to_string(),
            )))
            .boxed(),
            Plan::Hang => future::pending().boxed(),
        }
    }
}

/// Builds a manager on top of a scripted connector.
#[allow(dead_code)]
pub fn manager_with(
    plans: Vec<Plan>,
    fallback: Plan,
) -> (
    RealtimeManager,
    ScriptedConnector,
    mpsc::UnboundedReceiver<ServerSide>,
) {
    setup();
    let (connector, servers) = ScriptedConnector::new(plans, fallback);
    let manager = RealtimeManager::with_connector(
        RealtimeConfig::new(TEST_URL),
        Arc::new(connector.clone()),
    )
    .expect("test config is valid");
    (manager, connector, servers)
}

/// Lets the controller drain its queues without moving the paused clock far.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Collects the payloads a subscription callback receives.
#[allow(dead_code)]
pub fn recorder() -> (
    Arc<dyn Fn(&InboundMessage) + Send + Sync>,
    Arc<Mutex<Vec<Value>>>,
) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback = Arc::new(move |msg: &InboundMessage| {
        sink.lock().unwrap().push(msg.data.clone());
    });
    (callback, seen)
}
