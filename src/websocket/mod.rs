//! Real-time update client for the hazard reporting platform.
//!
//! A single [`RealtimeManager`] keeps one WebSocket open to the realtime
//! endpoint and multiplexes any number of logical subscriptions over it:
//!
//! - **location**: mentions near a point (`subscribe_to_location`)
//! - **report**: status changes of one report (`subscribe_to_report`)
//! - **global**: alerts and system status (`subscribe_to_global`)
//!
//! # Architecture
//!
//! - [`transport`]: socket open/send/close and raw frame events
//! - [`registry`]: the ordered set of subscriptions, the source of truth for
//!   what should be active on the wire
//! - [`router`]: parses inbound frames and fans them out by kind
//! - `heartbeat`: keep-alive pings while connected
//! - `controller`: the state machine that reconnects, backs off and replays
//!
//! # Usage
//!
//! ```no_run
//! use hazard_realtime::websocket::RealtimeManager;
//! use hazard_realtime::{InboundMessage, RealtimeConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = RealtimeManager::new(RealtimeConfig::new("wss://realtime.example.org/ws"))
//!         .expect("valid config");
//!
//!     let alerts = manager.subscribe_to_global(Arc::new(|msg: &InboundMessage| {
//!         println!("Alert: {}", msg.data);
//!     }));
//!     manager.subscribe_to_report("R-1042", Arc::new(|msg: &InboundMessage| {
//!         println!("Report update: {}", msg.data);
//!     }));
//!
//!     if let Err(e) = manager.connect().await {
//!         eprintln!("Initial connection failed, retrying in background: {}", e);
//!     }
//!
//!     tokio::signal::ctrl_c().await.expect("Failed to listen for ctrl+c");
//!     manager.unsubscribe(&alerts);
//!     manager.disconnect().await;
//! }
//! ```
//!
//! # Reconnection Behavior
//!
//! - Unclean closes and failed attempts are retried after
//!   `base_backoff * 2^n` (1s, 2s, 4s, 8s, 16s with the defaults)
//! - After `max_retries` failures the status becomes `error` and nothing
//!   else happens until [`RealtimeManager::reconnect`] is called
//! - Subscriptions survive reconnects and are replayed in registration order
//! - [`RealtimeManager::disconnect`] never triggers a retry and clears all subscriptions
//!
//! # Message Handling
//!
//! Callbacks run on the controller task; keep them short and non-blocking.

mod controller;
mod heartbeat;
pub mod manager;
pub mod registry;
pub mod router;
mod scheduler;
pub mod transport;

// Re-export the main types for easier access
pub use manager::RealtimeManager;
pub use registry::{Subscription, SubscriptionCallback, SubscriptionInfo, SubscriptionRegistry};
pub use transport::{
    Connector, LinkSender, Outbound, TransportEvent, TransportLink, WebsocketConnector,
};
