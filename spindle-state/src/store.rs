//! Display state store.
//!
//! [`DisplayStore`] is the single authoritative record of mode, brightness
//! and current track. Handles are cheap to clone and share one underlying
//! record; every write happens under one lock, and reads return owned
//! snapshots so callers never observe a partially applied update.

use parking_lot::RwLock;
use std::sync::Arc;

use crate::model::{Brightness, DisplayMode, DisplayState, Track};

/// Shared handle to the process-wide display state.
///
/// # Example
///
/// ```
/// use spindle_state::{DisplayMode, DisplayStore};
///
/// let store = DisplayStore::new();
/// assert_eq!(store.mode(), DisplayMode::AlbumArt);
///
/// let mode = store.rotate_mode(-1);
/// assert_eq!(mode, DisplayMode::Minimal);
/// assert_eq!(store.snapshot().mode, DisplayMode::Minimal);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DisplayStore {
    inner: Arc<RwLock<DisplayState>>,
}

impl DisplayStore {
    /// Create a store holding the default display state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a specific initial state.
    pub fn with_state(state: DisplayState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Owned copy of the whole record.
    pub fn snapshot(&self) -> DisplayState {
        self.inner.read().clone()
    }

    pub fn track(&self) -> Option<Track> {
        self.inner.read().track.clone()
    }

    pub fn mode(&self) -> DisplayMode {
        self.inner.read().mode
    }

    pub fn brightness(&self) -> Brightness {
        self.inner.read().brightness
    }

    /// Replace the current track, returning whether the identifier changed.
    pub fn set_track(&self, mut track: Track) -> bool {
        track.clamp_progress();
        let mut state = self.inner.write();
        let changed = state
            .track
            .as_ref()
            .map_or(true, |current| !current.same_track(&track));
        state.track = Some(track);
        changed
    }

    /// Update progress and playing flag of the current track in place.
    ///
    /// Returns `false` when there is no current track.
    pub fn update_progress(&self, progress_ms: u64, is_playing: bool) -> bool {
        let mut state = self.inner.write();
        match state.track.as_mut() {
            Some(track) => {
                track.progress_ms = progress_ms;
                track.is_playing = is_playing;
                track.clamp_progress();
                true
            }
            None => false,
        }
    }

    /// Forget the current track.
    pub fn clear_track(&self) -> Option<Track> {
        self.inner.write().track.take()
    }

    /// Set the display mode, returning whether it changed.
    pub fn set_mode(&self, mode: DisplayMode) -> bool {
        self.set_mode_then(mode, |_| ())
    }

    /// Set the display mode and run `then` with the new mode before the
    /// lock is released.
    ///
    /// Returns whether the mode changed.
    pub fn set_mode_then<F: FnOnce(DisplayMode)>(&self, mode: DisplayMode, then: F) -> bool {
        let mut state = self.inner.write();
        let changed = state.mode != mode;
        state.mode = mode;
        then(mode);
        changed
    }

    /// Rotate the display mode by `delta` positions and return the new mode.
    ///
    /// The read and the write happen under the same lock.
    pub fn rotate_mode(&self, delta: i64) -> DisplayMode {
        self.rotate_mode_then(delta, |_| ())
    }

    /// Rotate the display mode and run `then` with the new mode before the
    /// lock is released.
    ///
    /// Concurrent writers observe `then` calls in the same order as their
    /// writes. `then` must not touch the store.
    pub fn rotate_mode_then<F: FnOnce(DisplayMode)>(&self, delta: i64, then: F) -> DisplayMode {
        let mut state = self.inner.write();
        state.mode = state.mode.rotate(delta);
        then(state.mode);
        state.mode
    }

    pub fn set_brightness(&self, brightness: Brightness) {
        self.inner.write().brightness = brightness;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;

    fn track(id: &str) -> Track {
        Track::new(id, "Title", "Artist", "Album", SourceKind::Demo).with_duration(10_000)
    }

    #[test]
    fn test_set_track_reports_identity_change() {
        let store = DisplayStore::new();
        assert!(store.set_track(track("t1")));
        assert!(!store.set_track(track("t1").with_progress(500, true)));
        assert!(store.set_track(track("t2")));
        assert_eq!(store.track().unwrap().id.as_str(), "t2");
    }

    #[test]
    fn test_update_progress_requires_track() {
        let store = DisplayStore::new();
        assert!(!store.update_progress(1_000, true));

        store.set_track(track("t1"));
        assert!(store.update_progress(1_000, true));

        let current = store.track().unwrap();
        assert_eq!(current.progress_ms, 1_000);
        assert!(current.is_playing);
    }

    #[test]
    fn test_update_progress_clamps() {
        let store = DisplayStore::new();
        store.set_track(track("t1"));
        store.update_progress(99_000, true);
        assert_eq!(store.track().unwrap().progress_ms, 10_000);
    }

    #[test]
    fn test_clones_share_state() {
        let store = DisplayStore::new();
        let reader = store.clone();

        store.set_mode(DisplayMode::Lyrics);
        store.set_track(track("t1"));

        let snapshot = reader.snapshot();
        assert_eq!(snapshot.mode, DisplayMode::Lyrics);
        assert_eq!(snapshot.track.map(|t| t.id.to_string()), Some("t1".to_string()));
    }

    #[test]
    fn test_set_mode_reports_change() {
        let store = DisplayStore::new();
        assert!(!store.set_mode(DisplayMode::AlbumArt));
        assert!(store.set_mode(DisplayMode::Visualizer));
    }

    #[test]
    fn test_clear_track() {
        let store = DisplayStore::new();
        store.set_track(track("t1"));
        assert!(store.clear_track().is_some());
        assert!(store.track().is_none());
    }

    #[test]
    fn test_mode_callbacks_follow_write_order() {
        let store = DisplayStore::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let seen = Arc::clone(&seen);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            store.rotate_mode_then(1 + i as i64, |mode| seen.lock().push(mode));
                        } else {
                            store.set_mode_then(DisplayMode::ALL[i % 5], |mode| seen.lock().push(mode));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 400);
        assert_eq!(seen.last().copied(), Some(store.mode()));
    }

    #[test]
    fn test_concurrent_rotation_is_serialized() {
        let store = DisplayStore::new();
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store.rotate_mode(1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 1000 steps over 5 modes lands back on the start
        assert_eq!(store.mode(), DisplayMode::AlbumArt);
    }
}
