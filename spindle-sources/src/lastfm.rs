//! Scrobble API source backed by Last.fm.
//!
//! Last.fm reports what was scrobbled, not live playback, so tracks carry no
//! progress. Artist and track details come from two extra calls that are
//! cached per (artist, title) so each song triggers them once.

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;

use spindle_state::{SourceKind, Track};

use crate::config::LastFmConfig;
use crate::error::{with_timeout, Result, SourceError};
use crate::source::MusicSource;

const MAX_CACHED: usize = 64;
const MAX_BIO_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::Many(items) => items.into_iter().next(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: Option<RecentTracks>,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    track: Option<OneOrMany<RecentTrack>>,
}

#[derive(Debug, Deserialize)]
struct RecentTrack {
    name: String,
    #[serde(default)]
    mbid: Option<String>,
    artist: Option<ArtistField>,
    album: Option<TextField>,
    #[serde(default)]
    image: Vec<ImageField>,
    #[serde(rename = "@attr")]
    attr: Option<TrackAttr>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtistField {
    Extended { name: String },
    Text(TextField),
    Plain(String),
}

impl ArtistField {
    fn name(&self) -> &str {
        match self {
            ArtistField::Extended { name } => name,
            ArtistField::Text(text) => &text.text,
            ArtistField::Plain(name) => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TextField {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ImageField {
    #[serde(rename = "#text", default)]
    url: String,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    nowplaying: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ArtistInfoResponse {
    artist: Option<ArtistInfo>,
}

#[derive(Debug, Deserialize)]
struct ArtistInfo {
    #[serde(default)]
    image: Vec<ImageField>,
    tags: Option<Tags>,
    bio: Option<Bio>,
}

#[derive(Debug, Deserialize)]
struct Tags {
    #[serde(default)]
    tag: Option<OneOrMany<Tag>>,
}

#[derive(Debug, Deserialize)]
struct Tag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Bio {
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct TrackInfoResponse {
    track: Option<TrackInfo>,
}

#[derive(Debug, Deserialize)]
struct TrackInfo {
    // Last.fm sends durations as strings
    duration: Option<serde_json::Value>,
}

/// Enrichment gathered from the artist and track detail calls.
#[derive(Debug, Clone, Default, PartialEq)]
struct Details {
    artist_image_url: Option<String>,
    genre: Option<Vec<String>>,
    artist_bio: Option<String>,
    duration_ms: u64,
}

/// Last non-empty image, which Last.fm lists smallest first.
fn largest_image(images: &[ImageField]) -> Option<String> {
    images
        .iter()
        .rev()
        .find(|img| !img.url.is_empty())
        .map(|img| img.url.clone())
}

fn anchor_tags() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<a href=".*?">.*?</a>"#).ok()).as_ref()
}

/// Remove HTML links and truncate to a display-friendly length.
pub fn clean_bio(bio: &str) -> Option<String> {
    let stripped = match anchor_tags() {
        Some(re) => re.replace_all(bio, "").into_owned(),
        None => bio.to_string(),
    };
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_BIO_CHARS).collect())
}

/// Follows a Last.fm user's scrobbles.
#[derive(Debug)]
pub struct LastFmSource {
    client: reqwest::Client,
    config: LastFmConfig,
    details: Mutex<HashMap<(String, String), Details>>,
}

impl LastFmSource {
    pub fn new(config: LastFmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            details: Mutex::new(HashMap::new()),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(SourceError::NotConfigured("lastfm api key"))?;

        let response = self
            .client
            .get(&self.config.api_url)
            .query(params)
            .query(&[("api_key", api_key), ("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                endpoint: params
                    .iter()
                    .find(|(k, _)| *k == "method")
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn recent_track(&self) -> Result<Option<RecentTrack>> {
        let username = self
            .config
            .username
            .as_deref()
            .ok_or(SourceError::NotConfigured("lastfm username"))?;

        let response: RecentTracksResponse = self
            .call(&[
                ("method", "user.getrecenttracks"),
                ("user", username),
                ("limit", "1"),
                ("extended", "1"),
            ])
            .await?;

        Ok(response
            .recenttracks
            .and_then(|r| r.track)
            .and_then(OneOrMany::into_first))
    }

    async fn artist_details(&self, artist: &str) -> Option<ArtistInfo> {
        match self
            .call::<ArtistInfoResponse>(&[("method", "artist.getinfo"), ("artist", artist)])
            .await
        {
            Ok(response) => response.artist,
            Err(e) => {
                debug!(artist, error = %e, "artist.getinfo failed");
                None
            }
        }
    }

    async fn track_duration(&self, artist: &str, title: &str) -> Option<u64> {
        match self
            .call::<TrackInfoResponse>(&[
                ("method", "track.getinfo"),
                ("artist", artist),
                ("track", title),
            ])
            .await
        {
            Ok(response) => response.track.and_then(|t| t.duration).and_then(|d| match d {
                serde_json::Value::String(s) => s.parse().ok(),
                serde_json::Value::Number(n) => n.as_u64(),
                _ => None,
            }),
            Err(e) => {
                debug!(artist, title, error = %e, "track.getinfo failed");
                None
            }
        }
    }

    async fn details(&self, artist: &str, title: &str) -> Details {
        let key = (artist.to_string(), title.to_string());
        let cached = self.details.lock().get(&key).cloned();
        if let Some(cached) = cached {
            return cached;
        }

        let mut details = Details::default();
        if let Some(info) = self.artist_details(artist).await {
            details.artist_image_url = largest_image(&info.image);
            let tags: Vec<String> = info
                .tags
                .and_then(|t| t.tag)
                .map(|t| match t {
                    OneOrMany::Many(tags) => tags,
                    OneOrMany::One(tag) => vec![tag],
                })
                .unwrap_or_default()
                .into_iter()
                .take(3)
                .map(|t| t.name)
                .collect();
            if !tags.is_empty() {
                details.genre = Some(tags);
            }
            details.artist_bio = info.bio.and_then(|b| clean_bio(&b.summary));
        }
        details.duration_ms = self.track_duration(artist, title).await.unwrap_or(0);

        let mut cache = self.details.lock();
        if cache.len() >= MAX_CACHED {
            cache.clear();
        }
        cache.insert(key, details.clone());
        details
    }

    /// Number of (artist, title) pairs with cached details.
    pub fn cached_details(&self) -> usize {
        self.details.lock().len()
    }
}

#[async_trait]
impl MusicSource for LastFmSource {
    fn kind(&self) -> SourceKind {
        SourceKind::LastFm
    }

    async fn fetch_current(&self) -> Result<Option<Track>> {
        if !self.config.is_configured() {
            return Err(SourceError::NotConfigured("lastfm api key and username"));
        }

        let Some(recent) = with_timeout(self.config.timeout(), self.recent_track()).await? else {
            return Ok(None);
        };

        let artist = recent
            .artist
            .as_ref()
            .map(|a| a.name().to_string())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| "Unknown Artist".to_string());
        let id = recent
            .mbid
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("lastfm_{}", recent.name));
        let is_playing = recent
            .attr
            .as_ref()
            .and_then(|a| a.nowplaying.as_deref())
            == Some("true");

        let mut track = Track::new(
            id,
            recent.name.clone(),
            artist.clone(),
            recent
                .album
                .as_ref()
                .map(|a| a.text.clone())
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| "Unknown Album".to_string()),
            SourceKind::LastFm,
        )
        .with_progress(0, is_playing);
        track.artwork_url = largest_image(&recent.image);

        let details = self.details(&artist, &recent.name).await;
        track.artist_image_url = details.artist_image_url;
        track.genre = details.genre;
        track.artist_bio = details.artist_bio;
        track.duration_ms = details.duration_ms;

        Ok(Some(track))
    }
}
