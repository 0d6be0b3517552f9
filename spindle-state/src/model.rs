//! Core data model: tracks, display modes and the display state record.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StateError;

/// Provider-scoped track identifier.
///
/// Identifier equality is the only criterion for "same track": two snapshots
/// with the same id are the same track even if every other field differs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TrackId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Which upstream provider produced a track, and which source is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Polled commercial streaming API
    Spotify,
    /// Polled scrobble API
    #[serde(rename = "lastfm")]
    LastFm,
    /// Microphone listener with audio fingerprint lookup
    Fingerprint,
    /// Built-in synthetic playlist
    Demo,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Spotify => "spotify",
            SourceKind::LastFm => "lastfm",
            SourceKind::Fingerprint => "fingerprint",
            SourceKind::Demo => "demo",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a single track as fetched from a source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(rename = "album_art_url")]
    pub artwork_url: Option<String>,
    #[serde(default)]
    pub album_art_colors: Option<Vec<String>>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub progress_ms: u64,
    #[serde(default)]
    pub is_playing: bool,
    pub source: SourceKind,

    // Enrichment
    #[serde(default)]
    pub release_year: Option<u16>,
    #[serde(default)]
    pub genre: Option<Vec<String>>,
    #[serde(default)]
    pub lyrics: Option<String>,
    #[serde(default)]
    pub artist_image_url: Option<String>,
    #[serde(default)]
    pub artist_bio: Option<String>,
}

impl Track {
    /// Create a bare track with no artwork, progress or enrichment.
    pub fn new(
        id: impl Into<TrackId>,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        source: SourceKind,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            artwork_url: None,
            album_art_colors: None,
            duration_ms: 0,
            progress_ms: 0,
            is_playing: false,
            source,
            release_year: None,
            genre: None,
            lyrics: None,
            artist_image_url: None,
            artist_bio: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self.clamp_progress();
        self
    }

    pub fn with_progress(mut self, progress_ms: u64, is_playing: bool) -> Self {
        self.progress_ms = progress_ms;
        self.is_playing = is_playing;
        self.clamp_progress();
        self
    }

    pub fn with_artwork(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }

    pub fn with_lyrics(mut self, lyrics: impl Into<String>) -> Self {
        self.lyrics = Some(lyrics.into());
        self
    }

    /// Whether this snapshot refers to the same track as `other`.
    pub fn same_track(&self, other: &Track) -> bool {
        self.id == other.id
    }

    /// Whether lyrics are present and non-empty.
    pub fn has_lyrics(&self) -> bool {
        self.lyrics.as_deref().is_some_and(|l| !l.trim().is_empty())
    }

    /// Enforce `progress <= duration` when the duration is known.
    pub fn clamp_progress(&mut self) {
        if self.duration_ms > 0 && self.progress_ms > self.duration_ms {
            self.progress_ms = self.duration_ms;
        }
    }
}

/// Display mode, cycled by the rotary control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    AlbumArt,
    Lyrics,
    ArtistInfo,
    Visualizer,
    Minimal,
}

impl DisplayMode {
    /// All modes in rotation order.
    pub const ALL: [DisplayMode; 5] = [
        DisplayMode::AlbumArt,
        DisplayMode::Lyrics,
        DisplayMode::ArtistInfo,
        DisplayMode::Visualizer,
        DisplayMode::Minimal,
    ];

    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|m| m == self)
            .unwrap_or_default()
    }

    /// Move `delta` positions through [`DisplayMode::ALL`], wrapping in both directions.
    ///
    /// # Example
    ///
    /// ```
    /// use spindle_state::DisplayMode;
    ///
    /// assert_eq!(DisplayMode::AlbumArt.rotate(1), DisplayMode::Lyrics);
    /// assert_eq!(DisplayMode::AlbumArt.rotate(-1), DisplayMode::Minimal);
    /// assert_eq!(DisplayMode::AlbumArt.rotate(11), DisplayMode::Lyrics);
    /// ```
    pub fn rotate(self, delta: i64) -> Self {
        let len = Self::ALL.len() as i64;
        // Reduce first so deltas near the i64 bounds cannot overflow
        let step = delta.rem_euclid(len);
        Self::ALL[((self.index() as i64 + step) % len) as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::AlbumArt => "album_art",
            DisplayMode::Lyrics => "lyrics",
            DisplayMode::ArtistInfo => "artist_info",
            DisplayMode::Visualizer => "visualizer",
            DisplayMode::Minimal => "minimal",
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| StateError::InvalidMode(s.to_string()))
    }
}

/// Panel brightness, bounded to `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Brightness(u8);

impl Brightness {
    pub const MAX: u8 = 100;

    /// Mid-scale.
    pub const DEFAULT: Brightness = Brightness(50);

    /// Construct a brightness, saturating at [`Brightness::MAX`].
    pub fn saturating(value: u8) -> Self {
        Self(value.min(Self::MAX))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Brightness {
    type Error = StateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            return Err(StateError::InvalidBrightness(value));
        }
        Ok(Self(value))
    }
}

impl From<Brightness> for u8 {
    fn from(b: Brightness) -> u8 {
        b.0
    }
}

/// The process-wide display record broadcast to consumers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayState {
    pub mode: DisplayMode,
    pub brightness: Brightness,
    pub track: Option<Track>,
}
