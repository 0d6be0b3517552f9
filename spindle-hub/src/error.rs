//! Error types for the spindle-hub crate.

/// Errors that can occur while running the hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// No port in the configured range could be bound
    #[error("No available port found in range {start}-{end}")]
    NoAvailablePort {
        /// First port tried
        start: u16,
        /// Last port tried
        end: u16,
    },

    /// The HTTP server could not be started
    #[error("Server failed to start: {0}")]
    ServerStart(String),

    /// The server task did not stop cleanly
    #[error("Shutdown error: {0}")]
    Shutdown(String),

    /// An event could not be encoded for the wire
    #[error("Failed to encode event: {0}")]
    Encode(#[from] spindle_state::StateError),
}

/// Convenience type alias for Results using HubError.
pub type Result<T> = std::result::Result<T, HubError>;
