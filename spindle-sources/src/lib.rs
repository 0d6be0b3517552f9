//! Now-playing sources for spindle.
//!
//! Every provider implements [`MusicSource`]: a `fetch_current` pull plus
//! optional transport commands that fail soft. [`select`] picks the single
//! active source at startup.
//!
//! | Source | Cadence | Transport |
//! |---|---|---|
//! | [`SpotifySource`] | polled | yes |
//! | [`LastFmSource`] | polled, details cached per track | no |
//! | [`FingerprintSource`] | background listener, buffered | no |
//! | [`DemoSource`] | local clock | local |
//!
//! [`LyricsOvhClient`] implements [`LyricsProvider`] for enrichment.

pub mod config;
pub mod demo;
pub mod error;
pub mod fingerprint;
pub mod lastfm;
pub mod lyrics;
pub mod selector;
pub mod source;
pub mod spotify;

pub use config::{FingerprintConfig, LastFmConfig, LyricsConfig, SourcesConfig, SpotifyConfig};
pub use demo::DemoSource;
pub use error::{Result, SourceError};
pub use fingerprint::{AcoustIdRecognizer, FingerprintSource, ListenerHandle, ListenerStats, Recognizer};
pub use lastfm::LastFmSource;
pub use lyrics::{clean_artist, clean_title, format_lyrics, LyricsOvhClient, LyricsProvider};
pub use selector::select;
pub use source::{MusicSource, SharedSource};
pub use spotify::SpotifySource;
