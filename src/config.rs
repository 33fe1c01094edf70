use crate::error::{RealtimeError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 1_000;
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

const ENV_URL: &str = "HAZARD_WS_URL";
const ENV_MAX_RETRIES: &str = "HAZARD_WS_MAX_RETRIES";
const ENV_BASE_BACKOFF_MS: &str = "HAZARD_WS_BASE_BACKOFF_MS";
const ENV_HEARTBEAT_MS: &str = "HAZARD_WS_HEARTBEAT_MS";
const ENV_CONNECT_TIMEOUT_MS: &str = "HAZARD_WS_CONNECT_TIMEOUT_MS";

/// Construction-time settings for a [`RealtimeManager`](crate::websocket::RealtimeManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimeConfig {
    pub url: String, // ws:// or wss:// endpoint
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_base_backoff_ms() -> u64 {
    DEFAULT_BASE_BACKOFF_MS
}

fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

impl RealtimeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    /// Reads `HAZARD_WS_URL` plus the optional tuning variables.
    pub fn from_env() -> Result<Self> {
        let url = env::var(ENV_URL)
            .map_err(|_| RealtimeError::InvalidConfig(format!("{} is not set", ENV_URL)))?;
        let mut config = Self::new(url);
        if let Some(v) = env_number(ENV_MAX_RETRIES)? {
            config.max_retries = v;
        }
        if let Some(v) = env_number(ENV_BASE_BACKOFF_MS)? {
            config.base_backoff_ms = v;
        }
        if let Some(v) = env_number(ENV_HEARTBEAT_MS)? {
            config.heartbeat_interval_ms = v;
        }
        if let Some(v) = env_number(ENV_CONNECT_TIMEOUT_MS)? {
            config.connect_timeout_ms = v;
        }
        Ok(config)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_backoff_ms(mut self, ms: u64) -> Self {
        self.base_backoff_ms = ms;
        self
    }

    pub fn with_heartbeat_interval_ms(mut self, ms: u64) -> Self {
        self.heartbeat_interval_ms = ms;
        self
    }

    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Checks the endpoint and intervals, returning the parsed URL.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.url)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RealtimeError::InvalidConfig(format!(
                "Unsupported URL scheme '{}', expected ws or wss",
                url.scheme()
            )));
        }
        if self.base_backoff_ms == 0 {
            return Err(RealtimeError::InvalidConfig(
                "base_backoff_ms must be greater than zero".to_string(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(RealtimeError::InvalidConfig(
                "heartbeat_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(RealtimeError::InvalidConfig(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(url)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            RealtimeError::InvalidConfig(format!("{} must be a number, got '{}'", name, raw))
        }),
        Err(_) => Ok(None),
    }
}
