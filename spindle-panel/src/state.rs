//! What the panel currently shows, and what each event makes it redraw.

use std::time::Duration;

use spindle_state::{DomainEvent, Track, TrackId};

/// A redraw the client should perform.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderAction {
    /// Full redraw for a track not rendered before
    Expensive(Track),
    /// Progress redraw
    Cheap {
        progress_ms: u64,
        duration_ms: u64,
        is_playing: bool,
    },
}

/// Playback position of the active track, as the panel knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Playback {
    progress_ms: u64,
    duration_ms: u64,
    is_playing: bool,
}

impl Playback {
    fn cheap(&self) -> RenderAction {
        RenderAction::Cheap {
            progress_ms: self.progress_ms,
            duration_ms: self.duration_ms,
            is_playing: self.is_playing,
        }
    }

    fn set_progress(&mut self, progress_ms: u64) {
        self.progress_ms = if self.duration_ms > 0 {
            progress_ms.min(self.duration_ms)
        } else {
            progress_ms
        };
    }
}

/// Per-panel render state.
///
/// The expensive path is deduplicated against the last identifier this panel
/// rendered, not against anything the hub says: after a reconnect the `init`
/// frame may carry a track the panel already shows, or one it missed.
#[derive(Debug, Default, Clone)]
pub struct PanelState {
    last_rendered: Option<TrackId>,
    playback: Option<Playback>,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier of the last track sent to the expensive renderer.
    pub fn last_rendered(&self) -> Option<&TrackId> {
        self.last_rendered.as_ref()
    }

    /// Whether a track is active.
    pub fn has_track(&self) -> bool {
        self.playback.is_some()
    }

    /// Apply one event from the hub and return the redraws it calls for.
    pub fn apply(&mut self, event: &DomainEvent) -> Vec<RenderAction> {
        match event {
            DomainEvent::Init { track: Some(track), .. } | DomainEvent::TrackChanged { track } => {
                self.show_track(track)
            }
            DomainEvent::Init { track: None, .. } => {
                self.playback = None;
                Vec::new()
            }
            DomainEvent::ProgressUpdated {
                progress_ms,
                is_playing,
            } => match self.playback.as_mut() {
                Some(playback) => {
                    playback.set_progress(*progress_ms);
                    playback.is_playing = *is_playing;
                    vec![playback.cheap()]
                }
                None => Vec::new(),
            },
            // Hardware panels have a fixed layout
            DomainEvent::ModeChanged { .. } => Vec::new(),
        }
    }

    /// Advance local progress by `elapsed` while playing.
    ///
    /// Progress holds at the duration once reached. Returns `None` when no
    /// track is active or playback is paused.
    pub fn tick(&mut self, elapsed: Duration) -> Option<RenderAction> {
        let playback = self.playback.as_mut().filter(|p| p.is_playing)?;
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        playback.set_progress(playback.progress_ms.saturating_add(elapsed_ms));
        Some(playback.cheap())
    }

    fn show_track(&mut self, track: &Track) -> Vec<RenderAction> {
        let mut playback = Playback {
            progress_ms: 0,
            duration_ms: track.duration_ms,
            is_playing: track.is_playing,
        };
        playback.set_progress(track.progress_ms);
        self.playback = Some(playback);

        let mut actions = Vec::with_capacity(2);
        if self.last_rendered.as_ref() != Some(&track.id) {
            self.last_rendered = Some(track.id.clone());
            actions.push(RenderAction::Expensive(track.clone()));
        }
        actions.push(playback.cheap());
        actions
    }
}
