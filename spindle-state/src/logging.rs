//! Logging setup shared by the spindle binaries.
//!
//! Library crates only emit `tracing` events; installing a subscriber is left
//! to the process entry point, which calls one of the functions here once.

use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose diagnostics with source locations
    Debug,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" => Ok(LoggingMode::Silent),
            "development" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            other => Err(LoggingError::InvalidEnv(format!(
                "SPINDLE_LOG_MODE={other}"
            ))),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Log levels accepted by `--log-level` flags.
pub const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Whether `level` is one of [`LOG_LEVELS`].
pub fn is_valid_level(level: &str) -> bool {
    LOG_LEVELS.contains(&level.to_lowercase().as_str())
}

/// Initialize logging with the specified mode.
///
/// # Environment Variables
///
/// - `SPINDLE_LOG_LEVEL`: Override log level or directive (e.g. `spindle_hub=debug`)
/// - `RUST_LOG`: Used when `SPINDLE_LOG_LEVEL` is unset
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    let default_level = match mode {
        LoggingMode::Debug => "debug",
        _ => "info",
    };
    init_logging_with_level(mode, default_level)
}

/// Initialize logging with a mode and a fallback level.
///
/// `default_level` applies only when neither `SPINDLE_LOG_LEVEL` nor
/// `RUST_LOG` is set.
pub fn init_logging_with_level(mode: LoggingMode, default_level: &str) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter(default_level);

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter(default_level);

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from environment variables.
///
/// Reads `SPINDLE_LOG_MODE` (`silent`, `development`, `debug`) and defaults
/// to development output when unset.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("SPINDLE_LOG_MODE") {
        Ok(value) => value.parse()?,
        Err(_) => LoggingMode::Development,
    };

    init_logging(mode)
}

/// Mode used by binaries for a `--log-level` flag value.
pub fn mode_for_level(level: &str) -> LoggingMode {
    match level.to_lowercase().as_str() {
        "debug" | "trace" => LoggingMode::Debug,
        _ => LoggingMode::Development,
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> EnvFilter {
    // SPINDLE_LOG_LEVEL, then RUST_LOG, then default
    if let Ok(level) = std::env::var("SPINDLE_LOG_LEVEL") {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}

/// Check if a global subscriber has been installed.
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
