use std::time::Duration;
use thiserror::Error;
use url::ParseError;

pub type Result<T, E = RealtimeError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Connection Timeout: socket did not open within {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Transport Error: {0}")]
    TransportError(String),

    #[error("Max Retries Exceeded: gave up after {attempts} attempts, last error: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },

    #[error("JSON Serialization/Deserialization Error: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("URL Parsing Error: {0}")]
    UrlParseError(#[from] ParseError),

    #[error("Invalid Configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection attempt cancelled: {0}")]
    Cancelled(String),

    #[error("Realtime manager has stopped")]
    ManagerStopped,
}

impl RealtimeError {
    /// Rebuilds a connection failure so it can be handed to several waiters.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            RealtimeError::ConnectionTimeout(after) => RealtimeError::ConnectionTimeout(*after),
            RealtimeError::MaxRetriesExceeded {
                attempts,
                last_error,
            } => RealtimeError::MaxRetriesExceeded {
                attempts: *attempts,
                last_error: last_error.clone(),
            },
            RealtimeError::Cancelled(reason) => RealtimeError::Cancelled(reason.clone()),
            RealtimeError::ManagerStopped => RealtimeError::ManagerStopped,
            other => RealtimeError::TransportError(other.to_string()),
        }
    }
}
