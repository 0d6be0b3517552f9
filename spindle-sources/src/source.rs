//! The uniform contract every now-playing provider implements.

use async_trait::async_trait;
use std::sync::Arc;

use spindle_state::{SourceKind, Track, TransportCommand};

use crate::error::Result;

/// A now-playing provider.
///
/// Pull-style providers answer `fetch_current` with a network call. Push-style
/// providers (the fingerprint listener) buffer their latest result and hand it
/// out here, so callers poll every source the same way.
///
/// Transport methods fail soft: a source without control capability keeps
/// the default implementations, which do nothing and return `false`.
#[async_trait]
pub trait MusicSource: Send + Sync {
    /// Which provider this is.
    fn kind(&self) -> SourceKind;

    /// The currently playing track, or `None` when nothing is playing.
    async fn fetch_current(&self) -> Result<Option<Track>>;

    /// Whether play/pause and skip commands have any effect.
    fn supports_transport(&self) -> bool {
        false
    }

    async fn play_pause(&self) -> bool {
        false
    }

    async fn next(&self) -> bool {
        false
    }

    async fn previous(&self) -> bool {
        false
    }

    /// Dispatch a transport command to the matching method.
    async fn transport(&self, command: TransportCommand) -> bool {
        match command {
            TransportCommand::PlayPause => self.play_pause().await,
            TransportCommand::Next => self.next().await,
            TransportCommand::Previous => self.previous().await,
        }
    }
}

/// Shared, type-erased source handle.
pub type SharedSource = Arc<dyn MusicSource>;
