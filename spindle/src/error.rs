use thiserror::Error;

use spindle_hub::HubError;
use spindle_sources::SourceError;
use spindle_stream::PollingError;

/// Errors from starting or stopping the service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Source or enrichment client could not be constructed
    #[error("Source setup failed: {0}")]
    Source(#[from] SourceError),

    /// Hub server failed to bind or stop
    #[error("Hub server error: {0}")]
    Hub(#[from] HubError),

    /// Poll loop could not be joined
    #[error("Polling error: {0}")]
    Polling(#[from] PollingError),

    /// The event forwarder task panicked
    #[error("Event forwarder failed: {0}")]
    Forwarder(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
