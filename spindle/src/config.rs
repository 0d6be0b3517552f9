//! Service configuration: defaults, then an optional JSON file, then
//! environment variables, then command line flags.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use spindle_hub::HubServerConfig;
use spindle_sources::SourcesConfig;
use spindle_state::logging::{is_valid_level, LOG_LEVELS};
use spindle_stream::PollingConfig;

/// Now-playing sync service
///
/// Polls the configured music source and pushes track, progress and display
/// mode changes to every connected screen.
#[derive(Parser, Debug, Default)]
#[command(name = "spindle")]
#[command(about = "Now-playing sync service for e-ink, OLED and browser displays")]
#[command(version)]
pub struct Args {
    /// JSON configuration file (default: <config dir>/spindle/config.json)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind the hub server to
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to bind the hub server to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Milliseconds between source polls
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Allow the microphone fingerprint listener to be selected
    #[arg(long)]
    pub enable_audio_listener: bool,
}

/// Complete service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source credentials and provider endpoints
    pub sources: SourcesConfig,

    /// Hub server bind address
    /// Default: 0.0.0.0:8000
    pub server: HubServerConfig,

    /// Pause between source polls
    /// Default: 500
    pub poll_interval_ms: u64,

    /// Bound on a single source fetch
    /// Default: 10
    pub fetch_timeout_secs: u64,

    /// Bound on lyrics lookup for a new track
    /// Default: 10
    pub enrichment_timeout_secs: u64,

    /// Default: "info"
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: SourcesConfig::default(),
            server: HubServerConfig::default(),
            poll_interval_ms: 500,
            fetch_timeout_secs: 10,
            enrichment_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Build the configuration for this process.
    ///
    /// Reads `args.config`, or the default file when it exists, then applies
    /// environment overrides and finally the flags in `args`.
    pub fn load(args: &Args) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.apply_args(args);
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/spindle/config.json`, when the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("spindle").join("config.json"))
    }

    /// Parse a JSON configuration file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply environment overrides, reading variables through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = var("SPOTIFY_CLIENT_ID") {
            self.sources.spotify.client_id = Some(value);
        }
        if let Some(value) = var("SPOTIFY_CLIENT_SECRET") {
            self.sources.spotify.client_secret = Some(value);
        }
        if let Some(value) = var("SPOTIFY_ACCESS_TOKEN") {
            self.sources.spotify.access_token = Some(value);
        }
        if let Some(value) = var("LASTFM_API_KEY") {
            self.sources.lastfm.api_key = Some(value);
        }
        if let Some(value) = var("LASTFM_USERNAME") {
            self.sources.lastfm.username = Some(value);
        }
        if let Some(value) = var("ACOUSTID_API_KEY") {
            self.sources.fingerprint.api_key = Some(value);
        }
        if let Some(value) = var("ENABLE_AUDIO_LISTENER") {
            self.sources.fingerprint.enabled = parse_flag(&value)
                .context("Invalid ENABLE_AUDIO_LISTENER environment variable")?;
        }

        if let Some(value) = var("SPINDLE_HOST") {
            self.server.host = value
                .parse()
                .context("Invalid SPINDLE_HOST environment variable")?;
        }
        if let Some(value) = var("SPINDLE_PORT") {
            let port: u16 = value
                .parse()
                .context("Invalid SPINDLE_PORT environment variable")?;
            self.server.port_range = (port, port);
        }
        if let Some(value) = var("SPINDLE_POLL_INTERVAL_MS") {
            self.poll_interval_ms = value
                .parse()
                .context("Invalid SPINDLE_POLL_INTERVAL_MS environment variable")?;
        }
        if let Some(value) = var("SPINDLE_LOG_LEVEL") {
            self.log_level = value;
        }

        Ok(())
    }

    /// Apply command line flags, which win over everything else.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host;
        }
        if let Some(port) = args.port {
            self.server.port_range = (port, port);
        }
        if let Some(interval) = args.poll_interval_ms {
            self.poll_interval_ms = interval;
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        if args.enable_audio_listener {
            self.sources.fingerprint.enabled = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !is_valid_level(&self.log_level) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Valid levels: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        self.server
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid server configuration: {e}"))?;
        self.polling()
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid polling configuration: {e}"))?;

        Ok(())
    }

    /// Orchestrator settings derived from this configuration.
    pub fn polling(&self) -> PollingConfig {
        PollingConfig::new()
            .with_interval(Duration::from_millis(self.poll_interval_ms))
            .with_fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .with_enrichment_timeout(Duration::from_secs(self.enrichment_timeout_secs))
    }

    /// Log the effective configuration without credentials.
    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  Server: {}:{}-{}", self.server.host, self.server.port_range.0, self.server.port_range.1);
        info!("  Poll interval: {}ms", self.poll_interval_ms);
        info!("  Spotify credentials: {}", self.sources.spotify.has_credentials());
        info!("  Last.fm credentials: {}", self.sources.lastfm.is_configured());
        info!(
            "  Audio listener: enabled={} keyed={}",
            self.sources.fingerprint.enabled,
            self.sources.fingerprint.has_credentials()
        );
        info!("  Log level: {}", self.log_level);
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(anyhow::anyhow!("expected true or false, got '{other}'")),
    }
}
