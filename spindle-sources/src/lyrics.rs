//! Lyrics lookup used to enrich newly detected tracks.

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::LyricsConfig;
use crate::error::{with_timeout, Result, SourceError};

/// Looks up lyrics by artist and title.
#[async_trait]
pub trait LyricsProvider: Send + Sync {
    /// Lyrics text, or `None` when the provider has no match.
    async fn lookup(&self, artist: &str, title: &str) -> Result<Option<String>>;
}

/// Client for the lyrics.ovh API.
#[derive(Debug, Clone)]
pub struct LyricsOvhClient {
    client: reqwest::Client,
    api_base: Url,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct LyricsResponse {
    lyrics: Option<String>,
}

impl LyricsOvhClient {
    pub fn new(config: &LyricsConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: Url::parse(&config.api_base)?,
            timeout: config.timeout(),
        })
    }

    async fn fetch(&self, url: Url) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            debug!(status = response.status().as_u16(), "No lyrics found");
            return Ok(None);
        }
        let body: LyricsResponse = response.json().await?;
        Ok(body.lyrics)
    }

    fn lookup_url(&self, artist: &str, title: &str) -> Result<Url> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| SourceError::Decode("lyrics base url cannot have a path".to_string()))?
            .pop_if_empty()
            .push(artist)
            .push(title);
        Ok(url)
    }
}

#[async_trait]
impl LyricsProvider for LyricsOvhClient {
    async fn lookup(&self, artist: &str, title: &str) -> Result<Option<String>> {
        let artist = clean_artist(artist);
        let title = clean_title(title);
        if artist.is_empty() || title.is_empty() {
            return Ok(None);
        }

        let url = self.lookup_url(&artist, &title)?;
        debug!(%artist, %title, "Looking up lyrics");

        let Some(raw) = with_timeout(self.timeout, self.fetch(url)).await? else {
            return Ok(None);
        };
        let lyrics = format_lyrics(&raw);
        Ok((!lyrics.is_empty()).then_some(lyrics))
    }
}

fn bracketed() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*[(\[].*?[)\]]").ok()).as_ref()
}

fn version_suffix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s*-\s*(remastered|live|radio edit|single version).*$").ok())
        .as_ref()
}

/// Strip bracketed annotations and version suffixes from a title.
pub fn clean_title(title: &str) -> String {
    let mut cleaned = title.to_string();
    if let Some(re) = bracketed() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    if let Some(re) = version_suffix() {
        cleaned = re.replace(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

/// Keep only the first credited artist.
pub fn clean_artist(artist: &str) -> String {
    let mut cleaned = artist;
    if let Some((first, _)) = cleaned.split_once(',') {
        cleaned = first;
    }
    if let Some((first, _)) = cleaned.split_once(" & ") {
        cleaned = first;
    }
    let lower = cleaned.to_lowercase();
    if let Some(idx) = lower.find(" feat") {
        // Lowercasing can shift byte offsets for non-ASCII names
        if cleaned.is_char_boundary(idx) {
            cleaned = &cleaned[..idx];
        }
    }
    cleaned.trim().to_string()
}

/// Collapse runs of blank lines and trim.
pub fn format_lyrics(lyrics: &str) -> String {
    let mut lines = Vec::new();
    let mut prev_blank = false;
    for line in lyrics.lines() {
        let blank = line.trim().is_empty();
        if blank && prev_blank {
            continue;
        }
        lines.push(line);
        prev_blank = blank;
    }
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("Bohemian Rhapsody", "Bohemian Rhapsody")]
    #[case("Bohemian Rhapsody (Remastered 2011)", "Bohemian Rhapsody")]
    #[case("Song [Live at Wembley] (Demo)", "Song")]
    #[case("Hotel California - 2013 Remaster", "Hotel California - 2013 Remaster")]
    #[case("Hotel California - Remastered 2013", "Hotel California")]
    #[case("Heroes - Single Version", "Heroes")]
    #[case("Roxanne - live", "Roxanne")]
    #[case("Thing - Radio Edit", "Thing")]
    fn test_clean_title(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_title(input), expected);
    }

    #[rstest]
    #[case("Queen", "Queen")]
    #[case("Simon & Garfunkel", "Simon")]
    #[case("Daft Punk, Pharrell Williams", "Daft Punk")]
    #[case("Calvin Harris feat. Rihanna", "Calvin Harris")]
    #[case("Calvin Harris Feat. Rihanna", "Calvin Harris")]
    #[case("  Björk  ", "Björk")]
    fn test_clean_artist(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_artist(input), expected);
    }

    #[test]
    fn test_format_lyrics_collapses_blank_runs() {
        let raw = "\n\nLine one\n\n\n\nLine two\n   \n\nLine three\n\n";
        assert_eq!(format_lyrics(raw), "Line one\n\nLine two\n   \nLine three");
    }

    #[tokio::test]
    async fn test_lookup_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/Queen/Bohemian%20Rhapsody")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"lyrics":"Is this the real life?\n\n\n\nIs this just fantasy?"}"#)
            .create_async()
            .await;

        let client = LyricsOvhClient::new(&LyricsConfig {
            api_base: server.url(),
            ..Default::default()
        })
        .unwrap();

        let lyrics = client
            .lookup("Queen", "Bohemian Rhapsody (Remastered 2011)")
            .await
            .unwrap();
        assert_eq!(
            lyrics.as_deref(),
            Some("Is this the real life?\n\nIs this just fantasy?")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_lookup_not_found_is_none() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":"No lyrics found"}"#)
            .create_async()
            .await;

        let client = LyricsOvhClient::new(&LyricsConfig {
            api_base: server.url(),
            ..Default::default()
        })
        .unwrap();

        assert!(client.lookup("Nobody", "Nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_uses_configured_timeout() {
        // Accepts connections at the socket level but never answers
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let client = LyricsOvhClient::new(&LyricsConfig {
            api_base: format!("http://{addr}"),
            timeout_secs: 1,
        })
        .unwrap();

        let started = std::time::Instant::now();
        let result = client.lookup("Queen", "Bohemian Rhapsody").await;
        assert!(matches!(result, Err(SourceError::Timeout(limit)) if limit == Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    proptest! {
        /// Formatting never leaves two blank lines in a row and keeps every
        /// line of text in order.
        #[test]
        fn prop_format_lyrics_collapses_blank_runs(raw in "[a-z \n]{0,200}") {
            let formatted = format_lyrics(&raw);
            let lines: Vec<&str> = formatted.lines().collect();
            prop_assert!(lines
                .windows(2)
                .all(|w| !(w[0].trim().is_empty() && w[1].trim().is_empty())));

            let text = |s: &str| -> Vec<String> {
                s.lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect()
            };
            prop_assert_eq!(text(&formatted), text(&raw));
        }
    }
}
