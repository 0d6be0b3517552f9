//! Render targets for a physical display.
//!
//! A panel has two paths: an expensive one (e-ink full refresh with album
//! art) that should only run when the track actually changes, and a cheap
//! one (OLED progress bar) that may run every second.

use async_trait::async_trait;
use tracing::info;

use spindle_state::Track;

/// Drawing backend for a panel.
#[async_trait]
pub trait PanelRenderer: Send + Sync {
    /// Full redraw for a newly active track.
    async fn render_expensive(&self, track: &Track);

    /// Progress redraw.
    async fn render_cheap(&self, progress_ms: u64, duration_ms: u64, is_playing: bool);

    /// Put the panel into its low-power state. Called once on shutdown.
    async fn sleep(&self) {}
}

/// Format milliseconds as `M:SS`.
pub fn format_time(ms: u64) -> String {
    let seconds = ms / 1000;
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// Renderer that writes what it would draw to the log.
///
/// Stands in for the e-ink and OLED drivers when no hardware is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogRenderer;

#[async_trait]
impl PanelRenderer for LogRenderer {
    async fn render_expensive(&self, track: &Track) {
        info!(
            title = %track.title,
            artist = %track.artist,
            album = %track.album,
            artwork = track.artwork_url.as_deref().unwrap_or("-"),
            "E-ink refresh"
        );
    }

    async fn render_cheap(&self, progress_ms: u64, duration_ms: u64, is_playing: bool) {
        let state = if is_playing { "playing" } else { "paused" };
        info!(
            "OLED {} {} / {}",
            state,
            format_time(progress_ms),
            format_time(duration_ms)
        );
    }

    async fn sleep(&self) {
        info!("Panels sleeping");
    }
}
