//! Error types for the spindle-state crate.

/// Errors raised while parsing or encoding state and wire messages.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Unknown display mode name
    #[error("Invalid display mode: {0}")]
    InvalidMode(String),

    /// Brightness outside `0..=100`
    #[error("Brightness out of range: {0}")]
    InvalidBrightness(u8),

    /// A consumer message could not be interpreted as a control event
    #[error("Invalid control message: {0}")]
    InvalidControl(String),

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results using StateError.
pub type Result<T> = std::result::Result<T, StateError>;
