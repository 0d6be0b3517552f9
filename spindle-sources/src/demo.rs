//! Built-in synthetic playlist used when no provider is configured.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use spindle_state::{SourceKind, Track};

use crate::error::Result;
use crate::source::MusicSource;

/// Self-looping demo playlist with local transport control.
///
/// Progress follows the wall clock while playing and freezes while paused.
/// When a track runs out the playlist advances, wrapping after the last one.
#[derive(Debug)]
pub struct DemoSource {
    tracks: Vec<Track>,
    position: Mutex<Position>,
}

#[derive(Debug)]
struct Position {
    index: usize,
    /// Progress accumulated before `resumed_at`
    offset_ms: u64,
    resumed_at: Instant,
    is_playing: bool,
}

impl DemoSource {
    /// Demo source with the built-in three track playlist.
    pub fn new() -> Self {
        Self::with_tracks(default_playlist())
    }

    /// Demo source over a custom playlist. An empty list yields no track.
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            position: Mutex::new(Position {
                index: 0,
                offset_ms: 0,
                resumed_at: Instant::now(),
                is_playing: true,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Snapshot of the current track with live progress.
    pub fn current(&self) -> Option<Track> {
        if self.tracks.is_empty() {
            return None;
        }

        let mut pos = self.position.lock();
        if pos.is_playing {
            let now = Instant::now();
            let mut progress = pos.offset_ms + now.duration_since(pos.resumed_at).as_millis() as u64;
            loop {
                let duration = self.tracks[pos.index].duration_ms;
                if duration == 0 || progress < duration {
                    break;
                }
                progress -= duration;
                pos.index = (pos.index + 1) % self.tracks.len();
            }
            pos.offset_ms = progress;
            pos.resumed_at = now;
        }

        let track = self.tracks[pos.index]
            .clone()
            .with_progress(pos.offset_ms, pos.is_playing);
        Some(track)
    }

    fn skip(&self, forward: bool) {
        if self.tracks.is_empty() {
            return;
        }
        let len = self.tracks.len();
        let mut pos = self.position.lock();
        pos.index = if forward {
            (pos.index + 1) % len
        } else {
            (pos.index + len - 1) % len
        };
        pos.offset_ms = 0;
        pos.resumed_at = Instant::now();
        debug!(index = pos.index, "Demo playlist skipped");
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MusicSource for DemoSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Demo
    }

    async fn fetch_current(&self) -> Result<Option<Track>> {
        Ok(self.current())
    }

    fn supports_transport(&self) -> bool {
        true
    }

    async fn play_pause(&self) -> bool {
        // Fold elapsed time into the offset before flipping state
        let _ = self.current();
        let mut pos = self.position.lock();
        pos.is_playing = !pos.is_playing;
        pos.resumed_at = Instant::now();
        debug!(playing = pos.is_playing, "Demo playback toggled");
        true
    }

    async fn next(&self) -> bool {
        self.skip(true);
        true
    }

    async fn previous(&self) -> bool {
        self.skip(false);
        true
    }
}

/// The built-in playlist.
pub fn default_playlist() -> Vec<Track> {
    let mut bohemian = Track::new(
        "demo_1",
        "Bohemian Rhapsody",
        "Queen",
        "A Night at the Opera",
        SourceKind::Demo,
    )
    .with_artwork("https://i.scdn.co/image/ab67616d0000b273ce4f1737bc8a646c8c4bd25a")
    .with_duration(354_000)
    .with_lyrics(
        "Is this the real life? Is this just fantasy?\n\
         Caught in a landslide, no escape from reality\n\
         Open your eyes, look up to the skies and see\n\
         I'm just a poor boy, I need no sympathy",
    );
    bohemian.release_year = Some(1975);
    bohemian.genre = Some(vec!["rock".to_string(), "classic rock".to_string()]);
    bohemian.artist_image_url =
        Some("https://i.scdn.co/image/b1dfbe843b0b9f54ab2e588f33e7637d2dab065a".to_string());

    let mut hotel = Track::new(
        "demo_2",
        "Hotel California",
        "Eagles",
        "Hotel California",
        SourceKind::Demo,
    )
    .with_artwork("https://i.scdn.co/image/ab67616d0000b2734637341b9f507521afa9a778")
    .with_duration(391_000)
    .with_lyrics(
        "On a dark desert highway, cool wind in my hair\n\
         Warm smell of colitas, rising up through the air\n\
         Up ahead in the distance, I saw a shimmering light",
    );
    hotel.release_year = Some(1977);
    hotel.genre = Some(vec!["rock".to_string(), "soft rock".to_string()]);

    let mut stairway = Track::new(
        "demo_3",
        "Stairway to Heaven",
        "Led Zeppelin",
        "Led Zeppelin IV",
        SourceKind::Demo,
    )
    .with_artwork("https://i.scdn.co/image/ab67616d0000b273c8a11e48c91a982d086afc69")
    .with_duration(482_000)
    .with_lyrics(
        "There's a lady who's sure all that glitters is gold\n\
         And she's buying a stairway to heaven",
    );
    stairway.release_year = Some(1971);
    stairway.genre = Some(vec!["rock".to_string(), "hard rock".to_string()]);

    vec![bohemian, hotel, stairway]
}
