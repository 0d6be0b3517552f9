//! Service wiring: source selection, hub server, poll loop and the event
//! forwarder between them.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use spindle_hub::{BroadcastHub, HubServer, SourceStatus};
use spindle_sources::{
    select, AcoustIdRecognizer, DemoSource, FingerprintSource, LastFmSource, ListenerHandle,
    LyricsOvhClient, Recognizer, SharedSource, SourcesConfig, SpotifySource,
};
use spindle_state::{DisplayStore, DomainEvent, SourceKind};
use spindle_stream::{Orchestrator, PollingStats, PollingTask};

use crate::config::Config;
use crate::control::ControlRouter;
use crate::error::{AppError, Result};

/// The source chosen at startup and how it was chosen.
pub struct SelectedSource {
    pub source: SharedSource,
    pub status: SourceStatus,
    /// Present when the fingerprint listener drives the display
    listener: Option<(FingerprintSource, Arc<dyn Recognizer>)>,
}

impl SelectedSource {
    pub fn kind(&self) -> SourceKind {
        self.status.active_source
    }
}

/// Pick and construct the active source.
///
/// Availability of the fingerprint listener is probed only when it is
/// enabled and keyed, since the probe searches `PATH` for its tools.
pub fn select_source(config: &SourcesConfig) -> SelectedSource {
    let recognizer = (config.fingerprint.enabled && config.fingerprint.has_credentials())
        .then(|| AcoustIdRecognizer::new(config.fingerprint.clone()))
        .filter(|recognizer| recognizer.is_available());

    let kind = select(config, recognizer.is_some());
    let status = SourceStatus {
        spotify: config.spotify.has_credentials(),
        lastfm: config.lastfm.is_configured(),
        audio_listener: recognizer.is_some(),
        demo_mode: kind == SourceKind::Demo,
        active_source: kind,
    };

    let mut listener = None;
    let source: SharedSource = match (kind, recognizer) {
        (SourceKind::Spotify, _) => Arc::new(SpotifySource::new(config.spotify.clone())),
        (SourceKind::LastFm, _) => Arc::new(LastFmSource::new(config.lastfm.clone())),
        (SourceKind::Fingerprint, Some(recognizer)) => {
            let buffer = FingerprintSource::new();
            let recognizer: Arc<dyn Recognizer> = Arc::new(recognizer);
            listener = Some((buffer.clone(), recognizer));
            Arc::new(buffer)
        }
        _ => Arc::new(DemoSource::new()),
    };

    info!(source = %kind, "Source selected");
    SelectedSource {
        source,
        status,
        listener,
    }
}

/// A running spindle service.
///
/// # Example
///
/// ```no_run
/// use spindle::{Config, Spindle};
///
/// # async fn run() -> spindle::Result<()> {
/// let service = Spindle::start(&Config::default()).await?;
/// println!("Displays connect to {}", service.ws_url());
///
/// tokio::signal::ctrl_c().await.ok();
/// let stats = service.shutdown().await?;
/// println!("{stats}");
/// # Ok(())
/// # }
/// ```
pub struct Spindle {
    server: HubServer,
    polling: PollingTask,
    listener: Option<ListenerHandle>,
    forwarder: JoinHandle<()>,
    forwarder_shutdown: mpsc::Sender<()>,
    store: DisplayStore,
    active_source: SourceKind,
}

impl Spindle {
    /// Select the source, then start the listener (when fingerprinting), the
    /// hub server, the event forwarder and the poll loop.
    pub async fn start(config: &Config) -> Result<Self> {
        let selected = select_source(&config.sources);
        Self::start_with(config, selected).await
    }

    /// Start with an already constructed source.
    pub async fn start_with(config: &Config, selected: SelectedSource) -> Result<Self> {
        let lyrics = Arc::new(LyricsOvhClient::new(&config.sources.lyrics)?);
        let active_source = selected.kind();

        let store = DisplayStore::new();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let listener = selected.listener.map(|(buffer, recognizer)| {
            let fingerprint = &config.sources.fingerprint;
            info!(interval = ?fingerprint.interval(), "Starting audio listener");
            buffer.listen(recognizer, fingerprint.interval(), fingerprint.error_backoff())
        });

        let hub = BroadcastHub::new(store.clone());
        let router = Arc::new(ControlRouter::new(
            Arc::clone(&selected.source),
            store.clone(),
            events_tx.clone(),
            selected.status,
        ));

        let server = match HubServer::start(&config.server, hub.clone(), router).await {
            Ok(server) => server,
            Err(e) => {
                if let Some(listener) = listener {
                    listener.shutdown().await;
                }
                return Err(e.into());
            }
        };

        let (forwarder_shutdown, shutdown_rx) = mpsc::channel::<()>(1);
        let forwarder = tokio::spawn(forward_events(events_rx, hub, shutdown_rx));

        let polling = Orchestrator::new(selected.source, store.clone(), events_tx, config.polling())
            .with_lyrics(lyrics)
            .start();

        info!(addr = %server.local_addr(), source = %active_source, "Spindle started");

        Ok(Self {
            server,
            polling,
            listener,
            forwarder,
            forwarder_shutdown,
            store,
            active_source,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn base_url(&self) -> String {
        self.server.base_url()
    }

    pub fn ws_url(&self) -> String {
        self.server.ws_url()
    }

    pub fn store(&self) -> &DisplayStore {
        &self.store
    }

    pub fn active_source(&self) -> SourceKind {
        self.active_source
    }

    pub fn stats(&self) -> PollingStats {
        self.polling.stats()
    }

    /// Stop the poll loop, the listener, the forwarder and the server, in
    /// that order.
    pub async fn shutdown(self) -> Result<PollingStats> {
        info!("Shutting down");
        let stats = self.polling.shutdown().await?;

        if let Some(listener) = self.listener {
            let listener_stats = listener.stats();
            listener.shutdown().await;
            debug!(?listener_stats, "Audio listener stopped");
        }

        let _ = self.forwarder_shutdown.send(()).await;
        self.forwarder
            .await
            .map_err(|e| AppError::Forwarder(e.to_string()))?;

        self.server.shutdown().await?;
        Ok(stats)
    }
}

/// Hand every emitted event to the hub in emission order.
async fn forward_events(
    mut events: mpsc::UnboundedReceiver<DomainEvent>,
    hub: BroadcastHub,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown_rx.recv() => break,
            event = events.recv() => event,
        };
        let Some(event) = event else {
            break;
        };

        match hub.broadcast(&event).await {
            Ok(delivered) => debug!(kind = event.kind(), delivered, "Event broadcast"),
            Err(e) => warn!(kind = event.kind(), error = %e, "Failed to broadcast event"),
        }
    }

    debug!("Event forwarder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_source_defaults_to_demo() {
        let selected = select_source(&SourcesConfig::default());
        assert_eq!(selected.kind(), SourceKind::Demo);
        assert!(selected.status.demo_mode);
        assert!(!selected.status.audio_listener);
        assert!(selected.listener.is_none());
        assert!(selected.source.supports_transport());
    }

    #[test]
    fn test_select_source_prefers_streaming_api() {
        let mut config = SourcesConfig::default();
        config.spotify.client_id = Some("id".to_string());
        config.spotify.client_secret = Some("secret".to_string());
        config.lastfm.api_key = Some("key".to_string());
        config.lastfm.username = Some("rj".to_string());

        let selected = select_source(&config);
        assert_eq!(selected.kind(), SourceKind::Spotify);
        assert_eq!(selected.source.kind(), SourceKind::Spotify);
        assert!(selected.status.spotify);
        assert!(selected.status.lastfm);
        assert!(!selected.status.demo_mode);
    }

    #[test]
    fn test_missing_fingerprint_tools_fall_back() {
        let mut config = SourcesConfig::default();
        config.fingerprint.enabled = true;
        config.fingerprint.api_key = Some("key".to_string());
        config.fingerprint.fpcalc_path = "/nonexistent/fpcalc".to_string();

        let selected = select_source(&config);
        assert_eq!(selected.kind(), SourceKind::Demo);
        assert!(!selected.status.audio_listener);
    }

    #[tokio::test]
    async fn test_forwarder_preserves_order() {
        let hub = BroadcastHub::new(DisplayStore::new());
        let mut connection = hub.connect().await.unwrap();
        connection.recv().await.unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = tokio::spawn(forward_events(rx, hub.clone(), shutdown_rx));

        for progress_ms in [1_000, 2_000, 3_000] {
            tx.send(DomainEvent::ProgressUpdated {
                progress_ms,
                is_playing: true,
            })
            .unwrap();
        }

        for expected in [1_000, 2_000, 3_000] {
            let frame = connection.recv().await.unwrap();
            let event = DomainEvent::from_json(&frame).unwrap();
            assert_eq!(
                event,
                DomainEvent::ProgressUpdated {
                    progress_ms: expected,
                    is_playing: true
                }
            );
        }

        shutdown_tx.send(()).await.unwrap();
        task.await.unwrap();
    }
}
