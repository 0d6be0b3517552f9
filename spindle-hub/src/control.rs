//! The seam between the hub's transports and whatever acts on user input.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use spindle_state::{DisplayMode, InputEvent, SourceKind, TransportCommand};

/// Which sources are usable and which one is driving the display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub spotify: bool,
    pub lastfm: bool,
    pub audio_listener: bool,
    pub demo_mode: bool,
    pub active_source: SourceKind,
}

impl SourceStatus {
    /// Status for a process running only the demo source.
    pub fn demo() -> Self {
        Self {
            spotify: false,
            lastfm: false,
            audio_listener: false,
            demo_mode: true,
            active_source: SourceKind::Demo,
        }
    }
}

/// Receives control input arriving over the socket and the REST surface.
///
/// Implementations own the side effects: writing the display store,
/// emitting events, issuing transport commands. The hub only decodes and
/// dispatches.
#[async_trait]
pub trait ControlHandler: Send + Sync {
    /// A decoded input event from a consumer's control channel.
    async fn handle_input(&self, event: InputEvent);

    /// Set the display mode explicitly.
    async fn set_mode(&self, mode: DisplayMode);

    /// Issue a transport command, reporting success.
    async fn transport(&self, command: TransportCommand) -> bool;

    fn status(&self) -> SourceStatus;
}
