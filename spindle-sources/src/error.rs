//! Error types for the spindle-sources crate.

use std::time::Duration;

/// Errors raised by source adapters and enrichment clients.
///
/// None of these are fatal: the polling loop logs them and treats the cycle
/// as having fetched nothing.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("Unexpected status {status} from {endpoint}")]
    Status {
        /// Endpoint that was called
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The call did not complete in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Credentials or required settings are missing
    #[error("Source not configured: {0}")]
    NotConfigured(&'static str),

    /// Audio capture or fingerprinting failed
    #[error("Recognizer error: {0}")]
    Recognizer(String),

    /// Local I/O failure (temp files, child processes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for SourceError {
    fn from(err: url::ParseError) -> Self {
        SourceError::Decode(format!("invalid url: {err}"))
    }
}

/// Convenience type alias for Results using SourceError.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Run `fut`, mapping an elapsed deadline to [`SourceError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| SourceError::Timeout(limit))?
}
