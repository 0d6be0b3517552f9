use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

use spindle_state::{SourceKind, Track};

use super::Recognizer;
use crate::config::FingerprintConfig;
use crate::error::{with_timeout, Result, SourceError};

const TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FpcalcOutput {
    fingerprint: String,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    #[serde(default)]
    score: f64,
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    artists: Vec<Named>,
    #[serde(default)]
    releasegroups: Vec<ReleaseGroup>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseGroup {
    id: Option<String>,
    title: Option<String>,
}

/// Root-mean-square level of 16-bit little-endian PCM.
pub fn pcm_rms(pcm: &[u8]) -> f64 {
    let samples = pcm.len() / 2;
    if samples == 0 {
        return 0.0;
    }
    let sum_squares: f64 = pcm
        .chunks_exact(2)
        .map(|b| {
            let s = i16::from_le_bytes([b[0], b[1]]) as f64;
            s * s
        })
        .sum();
    (sum_squares / samples as f64).sqrt()
}

/// Minimal mono 16-bit WAV container around raw PCM.
fn wav_bytes(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let byte_rate = sample_rate * 2;
    let mut out = Vec::with_capacity(44 + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&1u16.to_le_bytes()); // mono
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes()); // block align
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

/// Locate an executable by name on `PATH`, or check an explicit path.
fn find_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Records from a capture command, fingerprints with Chromaprint's `fpcalc`
/// and identifies through the AcoustID lookup service.
#[derive(Debug, Clone)]
pub struct AcoustIdRecognizer {
    client: reqwest::Client,
    config: FingerprintConfig,
}

impl AcoustIdRecognizer {
    pub fn new(config: FingerprintConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn record_sample(&self) -> Result<Vec<u8>> {
        let (program, args) = self
            .config
            .capture_command
            .split_first()
            .ok_or(SourceError::NotConfigured("capture command"))?;

        let output = with_timeout(TOOL_TIMEOUT, async {
            Ok::<_, SourceError>(Command::new(program).args(args).kill_on_drop(true).output().await?)
        })
        .await?;

        if !output.status.success() {
            return Err(SourceError::Recognizer(format!(
                "capture exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }

    async fn fingerprint(&self, path: &Path) -> Result<FpcalcOutput> {
        let output = with_timeout(TOOL_TIMEOUT, async {
            Ok::<_, SourceError>(Command::new(&self.config.fpcalc_path)
                .arg("-json")
                .arg(path)
                .kill_on_drop(true)
                .output()
                .await?)
        })
        .await?;

        if !output.status.success() {
            return Err(SourceError::Recognizer(format!(
                "fpcalc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    /// Look up a fingerprint and return the best match above the score floor.
    pub async fn lookup(&self, fingerprint: &str, duration_secs: u64) -> Result<Option<Track>> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(SourceError::NotConfigured("acoustid api key"))?;

        let duration = duration_secs.to_string();
        let request = self
            .client
            .get(&self.config.lookup_url)
            .query(&[
                ("client", api_key),
                ("fingerprint", fingerprint),
                ("duration", duration.as_str()),
                ("meta", "recordings releasegroups"),
            ])
            .send();

        let response = with_timeout(self.config.timeout(), async { Ok::<_, SourceError>(request.await?) }).await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                endpoint: self.config.lookup_url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body: LookupResponse = response.json().await?;
        Ok(best_match(body, self.config.min_score, duration_secs * 1000))
    }
}

fn best_match(response: LookupResponse, min_score: f64, duration_ms: u64) -> Option<Track> {
    if response.status != "ok" {
        return None;
    }

    let best = response
        .results
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))?;
    if best.score < min_score {
        debug!(score = best.score, "Best fingerprint match below threshold");
        return None;
    }

    let recording = best.recordings.into_iter().next()?;
    let release_group = recording.releasegroups.first();

    let mut track = Track::new(
        recording.id.clone().unwrap_or_else(|| "unknown".to_string()),
        recording.title.clone().unwrap_or_else(|| "Unknown Track".to_string()),
        recording
            .artists
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "Unknown Artist".to_string()),
        release_group
            .and_then(|g| g.title.clone())
            .unwrap_or_else(|| "Unknown Album".to_string()),
        SourceKind::Fingerprint,
    )
    .with_duration(duration_ms)
    .with_progress(0, true);

    track.artwork_url = release_group
        .and_then(|g| g.id.as_deref())
        .map(|id| format!("https://coverartarchive.org/release-group/{id}/front-500"));

    Some(track)
}

#[async_trait]
impl Recognizer for AcoustIdRecognizer {
    fn is_available(&self) -> bool {
        self.config.has_credentials()
            && find_executable(&self.config.fpcalc_path).is_some()
            && self
                .config
                .capture_command
                .first()
                .is_some_and(|program| find_executable(program).is_some())
    }

    async fn identify(&self) -> Result<Option<Track>> {
        let pcm = self.record_sample().await?;
        let level = pcm_rms(&pcm);
        if level <= self.config.silence_threshold {
            debug!(level, "Sample is silent, skipping identification");
            return Ok(None);
        }

        let path = std::env::temp_dir().join(format!("spindle-{}.wav", Uuid::new_v4()));
        tokio::fs::write(&path, wav_bytes(&pcm, self.config.sample_rate)).await?;
        let fingerprint = self.fingerprint(&path).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %e, "Could not remove sample file");
        }
        let fingerprint = fingerprint?;

        let track = self
            .lookup(&fingerprint.fingerprint, fingerprint.duration.round() as u64)
            .await?;
        if let Some(track) = &track {
            info!(title = %track.title, artist = %track.artist, "Identified track from audio");
        }
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_rms() {
        assert_eq!(pcm_rms(&[]), 0.0);
        assert_eq!(pcm_rms(&pcm(&[0, 0, 0, 0])), 0.0);
        assert_eq!(pcm_rms(&pcm(&[300, -300, 300, -300])), 300.0);
        assert!(pcm_rms(&pcm(&[50, -60, 40])) < 100.0);
    }

    #[test]
    fn test_wav_header() {
        let bytes = wav_bytes(&pcm(&[1, 2, 3]), 44_100);
        assert_eq!(bytes.len(), 44 + 6);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]), 6);
    }

    #[test]
    fn test_best_match_picks_highest_score() {
        let body = r#"{
            "status": "ok",
            "results": [
                {"score": 0.61, "recordings": [{"id": "low", "title": "Other"}]},
                {"score": 0.93, "recordings": [{
                    "id": "rec-1",
                    "title": "Heroes",
                    "artists": [{"name": "David Bowie"}],
                    "releasegroups": [{"id": "rg-9", "title": "Heroes"}]
                }]}
            ]
        }"#;
        let response: LookupResponse = serde_json::from_str(body).unwrap();
        let track = best_match(response, 0.5, 371_000).unwrap();

        assert_eq!(track.id.as_str(), "rec-1");
        assert_eq!(track.artist, "David Bowie");
        assert_eq!(track.source, SourceKind::Fingerprint);
        assert_eq!(track.duration_ms, 371_000);
        assert_eq!(
            track.artwork_url.as_deref(),
            Some("https://coverartarchive.org/release-group/rg-9/front-500")
        );
    }

    #[test]
    fn test_best_match_rejects_low_scores_and_errors() {
        let low: LookupResponse =
            serde_json::from_str(r#"{"status":"ok","results":[{"score":0.4,"recordings":[{"id":"x"}]}]}"#).unwrap();
        assert!(best_match(low, 0.5, 0).is_none());

        let error: LookupResponse = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert!(best_match(error, 0.5, 0).is_none());

        let empty: LookupResponse = serde_json::from_str(r#"{"status":"ok","results":[]}"#).unwrap();
        assert!(best_match(empty, 0.5, 0).is_none());
    }

    #[test]
    fn test_unavailable_without_key() {
        let recognizer = AcoustIdRecognizer::new(FingerprintConfig::default());
        assert!(!recognizer.is_available());
    }

    #[tokio::test]
    async fn test_lookup_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/lookup")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("client".into(), "key".into()),
                mockito::Matcher::UrlEncoded("duration".into(), "200".into()),
                mockito::Matcher::UrlEncoded("meta".into(), "recordings releasegroups".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"status":"ok","results":[{"score":0.8,"recordings":[{"id":"r","title":"T","artists":[{"name":"A"}]}]}]}"#)
            .create_async()
            .await;

        let recognizer = AcoustIdRecognizer::new(FingerprintConfig {
            api_key: Some("key".to_string()),
            lookup_url: format!("{}/v2/lookup", server.url()),
            ..Default::default()
        });

        let track = recognizer.lookup("AQAAfingerprint", 200).await.unwrap().unwrap();
        assert_eq!(track.title, "T");
        assert_eq!(track.duration_ms, 200_000);
        assert!(track.artwork_url.is_none());
        mock.assert_async().await;
    }
}
