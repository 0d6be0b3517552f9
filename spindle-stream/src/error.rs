//! Error types for the spindle-stream crate.

/// Errors from the polling orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum PollingError {
    /// The event receiver was dropped; nothing is listening any more
    #[error("Event channel closed")]
    ChannelClosed,

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The polling task panicked or was aborted
    #[error("Polling task failed: {0}")]
    TaskFailed(String),
}

/// Convenience type alias for Results using PollingError.
pub type Result<T> = std::result::Result<T, PollingError>;
