//! Streaming API source backed by the Spotify Web API.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use spindle_state::{SourceKind, Track};

use crate::config::SpotifyConfig;
use crate::error::{with_timeout, Result, SourceError};
use crate::source::MusicSource;

#[derive(Debug, Deserialize)]
struct PlaybackState {
    #[serde(default)]
    is_playing: bool,
    #[serde(default)]
    progress_ms: Option<u64>,
    item: Option<PlaybackItem>,
}

#[derive(Debug, Deserialize)]
struct PlaybackItem {
    id: Option<String>,
    name: String,
    #[serde(default)]
    duration_ms: u64,
    #[serde(default)]
    artists: Vec<ArtistRef>,
    album: Option<Album>,
}

#[derive(Debug, Deserialize)]
struct ArtistRef {
    id: Option<String>,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Album {
    name: String,
    #[serde(default)]
    images: Vec<Image>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Image {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    #[serde(default)]
    images: Vec<Image>,
    #[serde(default)]
    genres: Vec<String>,
}

fn largest_image(images: &[Image]) -> Option<String> {
    images
        .iter()
        .max_by_key(|img| img.width.unwrap_or(0))
        .map(|img| img.url.clone())
}

/// Polls the user's current playback and forwards transport commands.
#[derive(Debug, Clone)]
pub struct SpotifySource {
    client: reqwest::Client,
    config: SpotifyConfig,
}

impl SpotifySource {
    pub fn new(config: SpotifyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn token(&self) -> Result<&str> {
        self.config
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(SourceError::NotConfigured("spotify access token"))
    }

    async fn playback(&self) -> Result<Option<PlaybackState>> {
        let path = "/v1/me/player";
        let response = self
            .client
            .get(self.endpoint(path))
            .bearer_auth(self.token()?)
            .send()
            .await?;

        match response.status() {
            StatusCode::NO_CONTENT => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(SourceError::Status {
                endpoint: path.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn artist(&self, artist_id: &str) -> Result<Artist> {
        let path = format!("/v1/artists/{artist_id}");
        let response = self
            .client
            .get(self.endpoint(&path))
            .bearer_auth(self.token()?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                endpoint: path,
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    async fn command(&self, method: reqwest::Method, path: &str) -> Result<()> {
        let response = self
            .client
            .request(method, self.endpoint(path))
            .bearer_auth(self.token()?)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                endpoint: path.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn soft_command(&self, method: reqwest::Method, path: &str) -> bool {
        match with_timeout(self.config.timeout(), self.command(method, path)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path, error = %e, "Spotify transport command failed");
                false
            }
        }
    }

    async fn to_track(&self, state: PlaybackState) -> Option<Track> {
        let item = state.item?;
        let artist = item.artists.first();

        let id = item
            .id
            .clone()
            .unwrap_or_else(|| format!("spotify_{}", item.name));
        let album = item.album.as_ref();

        let mut track = Track::new(
            id,
            item.name.clone(),
            artist.map(|a| a.name.clone()).unwrap_or_else(|| "Unknown Artist".to_string()),
            album.map(|a| a.name.clone()).unwrap_or_else(|| "Unknown Album".to_string()),
            SourceKind::Spotify,
        )
        .with_duration(item.duration_ms)
        .with_progress(state.progress_ms.unwrap_or(0), state.is_playing);

        if let Some(album) = album {
            track.artwork_url = largest_image(&album.images);
            track.release_year = album
                .release_date
                .as_deref()
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse().ok());
        }

        // Artist details are best effort
        if let Some(artist_id) = artist.and_then(|a| a.id.as_deref()) {
            match self.artist(artist_id).await {
                Ok(details) => {
                    track.artist_image_url = largest_image(&details.images);
                    if !details.genres.is_empty() {
                        track.genre = Some(details.genres.into_iter().take(3).collect());
                    }
                }
                Err(e) => debug!(artist_id, error = %e, "Artist lookup failed"),
            }
        }

        Some(track)
    }
}

#[async_trait]
impl MusicSource for SpotifySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Spotify
    }

    async fn fetch_current(&self) -> Result<Option<Track>> {
        if !self.config.is_authenticated() {
            debug!("Spotify not authenticated, nothing to fetch");
            return Ok(None);
        }

        let state = with_timeout(self.config.timeout(), self.playback()).await?;
        match state {
            Some(state) => Ok(self.to_track(state).await),
            None => Ok(None),
        }
    }

    fn supports_transport(&self) -> bool {
        true
    }

    async fn play_pause(&self) -> bool {
        let playing = match with_timeout(self.config.timeout(), self.playback()).await {
            Ok(state) => state.map(|s| s.is_playing).unwrap_or(false),
            Err(e) => {
                warn!(error = %e, "Could not read playback state");
                return false;
            }
        };

        if playing {
            self.soft_command(reqwest::Method::PUT, "/v1/me/player/pause").await
        } else {
            self.soft_command(reqwest::Method::PUT, "/v1/me/player/play").await
        }
    }

    async fn next(&self) -> bool {
        self.soft_command(reqwest::Method::POST, "/v1/me/player/next").await
    }

    async fn previous(&self) -> bool {
        self.soft_command(reqwest::Method::POST, "/v1/me/player/previous").await
    }
}
