//! Configuration for the polling orchestrator.

use std::time::Duration;

use crate::error::PollingError;

/// Controls poll cadence and the bounds on every external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    /// Pause between poll cycles, independent of source
    /// Default: 500 milliseconds
    pub interval: Duration,

    /// Upper bound on a single `fetch_current` call
    /// Default: 10 seconds
    pub fetch_timeout: Duration,

    /// Upper bound on lyrics lookup for a new track
    /// Default: 10 seconds
    pub enrichment_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            fetch_timeout: Duration::from_secs(10),
            enrichment_timeout: Duration::from_secs(10),
        }
    }
}

impl PollingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), PollingError> {
        if self.interval == Duration::ZERO {
            return Err(PollingError::Configuration(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout == Duration::ZERO {
            return Err(PollingError::Configuration(
                "Fetch timeout must be greater than 0".to_string(),
            ));
        }

        if self.enrichment_timeout == Duration::ZERO {
            return Err(PollingError::Configuration(
                "Enrichment timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_enrichment_timeout(mut self, timeout: Duration) -> Self {
        self.enrichment_timeout = timeout;
        self
    }
}
