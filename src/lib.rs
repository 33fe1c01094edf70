pub mod config;
pub mod error;
pub mod types;
pub mod websocket;
pub use config::RealtimeConfig;
pub use error::{RealtimeError, Result};
pub use types::{
    ConnectionStatus, InboundMessage, MessageType, SubscriptionId, SubscriptionKind, TopicParams,
};
pub use websocket::RealtimeManager;
