//! Configuration for source adapters and enrichment clients.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for every source adapter plus lyrics lookup.
///
/// All fields deserialize with defaults so a partial JSON file is accepted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub spotify: SpotifyConfig,
    pub lastfm: LastFmConfig,
    pub fingerprint: FingerprintConfig,
    pub lyrics: LyricsConfig,
}

/// Streaming API credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    /// OAuth client id. Default: unset
    pub client_id: Option<String>,

    /// OAuth client secret. Default: unset
    pub client_secret: Option<String>,

    /// Bearer token used for API calls. Default: unset
    pub access_token: Option<String>,

    /// API root. Default: `https://api.spotify.com`
    pub api_base: String,

    /// Per-request timeout in seconds. Default: 10
    pub timeout_secs: u64,
}

impl SpotifyConfig {
    /// Client id and secret are both present.
    pub fn has_credentials(&self) -> bool {
        is_set(&self.client_id) && is_set(&self.client_secret)
    }

    pub fn is_authenticated(&self) -> bool {
        is_set(&self.access_token)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            access_token: None,
            api_base: "https://api.spotify.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for SpotifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Scrobble API credentials.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LastFmConfig {
    /// API key. Default: unset
    pub api_key: Option<String>,

    /// User whose scrobbles are followed. Default: unset
    pub username: Option<String>,

    /// API endpoint. Default: `https://ws.audioscrobbler.com/2.0/`
    pub api_url: String,

    /// Per-request timeout in seconds. Default: 10
    pub timeout_secs: u64,
}

impl LastFmConfig {
    pub fn is_configured(&self) -> bool {
        is_set(&self.api_key) && is_set(&self.username)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LastFmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            username: None,
            api_url: "https://ws.audioscrobbler.com/2.0/".to_string(),
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for LastFmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LastFmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("api_url", &self.api_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Microphone listener and fingerprint lookup settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Whether the listener may be selected at all. Default: false
    pub enabled: bool,

    /// AcoustID client key. Default: unset
    pub api_key: Option<String>,

    /// Lookup endpoint. Default: `https://api.acoustid.org/v2/lookup`
    pub lookup_url: String,

    /// Command that writes raw 16-bit little-endian mono PCM to stdout.
    ///
    /// Default: `arecord -q -f S16_LE -c 1 -r 44100 -d 10 -t raw`
    pub capture_command: Vec<String>,

    /// Fingerprint tool. Default: `fpcalc`
    pub fpcalc_path: String,

    /// Capture sample rate in Hz. Default: 44100
    pub sample_rate: u32,

    /// RMS level at or below which a sample counts as silence. Default: 100
    pub silence_threshold: f64,

    /// Minimum lookup score for a match. Default: 0.5
    pub min_score: f64,

    /// Pause between samples in seconds. Default: 2
    pub interval_secs: u64,

    /// Pause after a failed sample in seconds. Default: 5
    pub error_backoff_secs: u64,

    /// Lookup timeout in seconds. Default: 10
    pub timeout_secs: u64,
}

impl FingerprintConfig {
    pub fn has_credentials(&self) -> bool {
        is_set(&self.api_key)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            lookup_url: "https://api.acoustid.org/v2/lookup".to_string(),
            capture_command: ["arecord", "-q", "-f", "S16_LE", "-c", "1", "-r", "44100", "-d", "10", "-t", "raw"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            fpcalc_path: "fpcalc".to_string(),
            sample_rate: 44_100,
            silence_threshold: 100.0,
            min_score: 0.5,
            interval_secs: 2,
            error_backoff_secs: 5,
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for FingerprintConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintConfig")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("lookup_url", &self.lookup_url)
            .field("capture_command", &self.capture_command)
            .field("fpcalc_path", &self.fpcalc_path)
            .field("interval_secs", &self.interval_secs)
            .finish_non_exhaustive()
    }
}

/// Lyrics lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LyricsConfig {
    /// Lookup root. Default: `https://api.lyrics.ovh/v1`
    pub api_base: String,

    /// Per-lookup timeout in seconds. Default: 10
    pub timeout_secs: u64,
}

impl LyricsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.lyrics.ovh/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}
