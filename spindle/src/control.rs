//! Turns consumer input into display changes and transport commands.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use spindle_hub::{ControlHandler, SourceStatus};
use spindle_sources::SharedSource;
use spindle_state::{DisplayMode, DisplayStore, DomainEvent, InputEvent, TransportCommand};

/// Routes control input for the whole service.
///
/// | Input | Effect |
/// |---|---|
/// | `Rotate(d)` | rotate the display mode by `d`, emit `ModeChanged` |
/// | `Press` | toggle playback on the active source |
/// | `LongPress` | skip to the next track |
/// | `Touch(x, y)` | logged only |
///
/// Transport on a source without control capability succeeds as a no-op.
///
/// Mode changes go into the same event channel the orchestrator writes to,
/// so consumers see them in emission order with track and progress events.
pub struct ControlRouter {
    source: SharedSource,
    store: DisplayStore,
    events: mpsc::UnboundedSender<DomainEvent>,
    status: SourceStatus,
}

impl ControlRouter {
    pub fn new(
        source: SharedSource,
        store: DisplayStore,
        events: mpsc::UnboundedSender<DomainEvent>,
        status: SourceStatus,
    ) -> Self {
        Self {
            source,
            store,
            events,
            status,
        }
    }

    fn emit_mode(&self, mode: DisplayMode) {
        if self.events.send(DomainEvent::ModeChanged { mode }).is_err() {
            warn!(%mode, "Event channel closed, mode change not broadcast");
        }
    }

    async fn run_transport(&self, command: TransportCommand) -> bool {
        // Sources without transport control accept commands as no-ops
        if !self.source.supports_transport() {
            debug!(?command, source = %self.source.kind(), "Source has no transport control");
            return true;
        }

        let success = self.source.transport(command).await;
        if success {
            info!(?command, "Transport command sent");
        } else {
            warn!(?command, source = %self.source.kind(), "Transport command failed");
        }
        success
    }
}

#[async_trait]
impl ControlHandler for ControlRouter {
    async fn handle_input(&self, event: InputEvent) {
        match event {
            InputEvent::Rotate(delta) => {
                // Emit under the store lock so events follow write order
                let mode = self.store.rotate_mode_then(delta, |mode| self.emit_mode(mode));
                debug!(delta, %mode, "Display mode rotated");
            }
            InputEvent::Press => {
                self.run_transport(TransportCommand::PlayPause).await;
            }
            InputEvent::LongPress => {
                self.run_transport(TransportCommand::Next).await;
            }
            InputEvent::Touch { x, y } => {
                debug!(x, y, "Touch input");
            }
        }
    }

    async fn set_mode(&self, mode: DisplayMode) {
        self.store.set_mode_then(mode, |mode| self.emit_mode(mode));
        info!(%mode, "Display mode set");
    }

    async fn transport(&self, command: TransportCommand) -> bool {
        self.run_transport(command).await
    }

    fn status(&self) -> SourceStatus {
        self.status.clone()
    }
}
