//! Configuration for the panel client.

use std::time::Duration;

use crate::error::{PanelError, Result};

/// Environment variable that overrides [`PanelConfig::backend_url`].
pub const BACKEND_URL_ENV: &str = "SPINDLE_BACKEND_URL";

/// Configuration for a [`PanelClient`](crate::PanelClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelConfig {
    /// WebSocket URL of the hub's event channel
    /// Default: ws://localhost:8000/ws
    pub backend_url: String,

    /// First reconnect delay after a failure
    /// Default: 1 second
    pub initial_backoff: Duration,

    /// Upper bound for the reconnect delay
    /// Default: 30 seconds
    pub max_backoff: Duration,

    /// Interval of the cheap progress redraw
    /// Default: 1 second
    pub tick_interval: Duration,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            backend_url: "ws://localhost:8000/ws".to_string(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            tick_interval: Duration::from_secs(1),
        }
    }
}

impl PanelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, with the backend URL taken from `SPINDLE_BACKEND_URL` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend_url = url;
            }
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("ws://") || self.backend_url.starts_with("wss://")) {
            return Err(PanelError::Configuration(format!(
                "Backend URL must use ws:// or wss://, got '{}'",
                self.backend_url
            )));
        }

        if self.initial_backoff.is_zero() {
            return Err(PanelError::Configuration(
                "Initial backoff must be greater than 0".to_string(),
            ));
        }

        if self.initial_backoff > self.max_backoff {
            return Err(PanelError::Configuration(
                "Initial backoff must not exceed max backoff".to_string(),
            ));
        }

        if self.tick_interval.is_zero() {
            return Err(PanelError::Configuration(
                "Tick interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }
}
