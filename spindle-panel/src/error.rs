//! Error types for the spindle-panel crate.

/// Errors raised by the panel client.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    /// Could not open the event channel
    #[error("Connection failed: {0}")]
    Connect(String),

    /// A frame from the hub could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(#[from] spindle_state::StateError),

    /// A frame could not be written to the hub
    #[error("Send failed: {0}")]
    Send(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for PanelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        PanelError::Connect(err.to_string())
    }
}

/// Convenience type alias for Results using PanelError.
pub type Result<T> = std::result::Result<T, PanelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panel_error_display() {
        let error = PanelError::Connect("connection refused".to_string());
        assert_eq!(error.to_string(), "Connection failed: connection refused");

        let error = PanelError::Send("broken pipe".to_string());
        assert_eq!(error.to_string(), "Send failed: broken pipe");

        let error = PanelError::Configuration("tick interval must be positive".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: tick interval must be positive"
        );

        let error: PanelError = spindle_state::StateError::InvalidControl("missing data".to_string()).into();
        assert!(error.to_string().starts_with("Protocol error"));
    }
}
