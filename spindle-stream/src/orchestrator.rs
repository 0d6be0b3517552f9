//! Poll loop: fetch, classify, enrich, store, emit.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use spindle_sources::{LyricsProvider, SharedSource};
use spindle_state::{classify, DisplayStore, DomainEvent, Track, Transition};

use crate::config::PollingConfig;
use crate::error::{PollingError, Result};

/// What one poll cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing fetched (or the fetch failed); no state change, no event
    Idle,
    /// A different track became current and `TrackChanged` was emitted
    TrackChanged,
    /// Same track; `ProgressUpdated` was emitted
    ProgressUpdated,
}

#[derive(Debug, Default)]
struct Counters {
    polls: AtomicU64,
    fetch_failures: AtomicU64,
    track_changes: AtomicU64,
    progress_updates: AtomicU64,
    enrichment_attempts: AtomicU64,
    enrichment_failures: AtomicU64,
}

/// Snapshot of orchestrator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollingStats {
    pub polls: u64,
    pub fetch_failures: u64,
    pub track_changes: u64,
    pub progress_updates: u64,
    pub enrichment_attempts: u64,
    pub enrichment_failures: u64,
}

impl fmt::Display for PollingStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Polling Stats:")?;
        writeln!(f, "  Polls: {}", self.polls)?;
        writeln!(f, "  Fetch failures: {}", self.fetch_failures)?;
        writeln!(f, "  Track changes: {}", self.track_changes)?;
        writeln!(f, "  Progress updates: {}", self.progress_updates)?;
        write!(
            f,
            "  Enrichment: {} attempted, {} failed",
            self.enrichment_attempts, self.enrichment_failures
        )
    }
}

/// Drives the active source and publishes what changed.
///
/// Each cycle fetches one snapshot, classifies it against the store's
/// current track and then:
///
/// - on a new track, looks up lyrics if the track has none (bounded by
///   [`PollingConfig::enrichment_timeout`]), stores the track and emits
///   [`DomainEvent::TrackChanged`];
/// - on the same track, updates progress in place and emits
///   [`DomainEvent::ProgressUpdated`];
/// - when nothing was fetched, does nothing.
///
/// A failed or timed out fetch counts as nothing fetched.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use tokio::sync::mpsc;
/// use spindle_sources::DemoSource;
/// use spindle_state::DisplayStore;
/// use spindle_stream::{Orchestrator, PollingConfig};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (tx, mut rx) = mpsc::unbounded_channel();
/// let task = Orchestrator::new(Arc::new(DemoSource::new()), DisplayStore::new(), tx, PollingConfig::default())
///     .start();
///
/// while let Some(event) = rx.recv().await {
///     println!("{}", event.kind());
/// }
/// task.shutdown().await.unwrap();
/// # }
/// ```
pub struct Orchestrator {
    source: SharedSource,
    lyrics: Option<Arc<dyn LyricsProvider>>,
    store: DisplayStore,
    events: mpsc::UnboundedSender<DomainEvent>,
    config: PollingConfig,
    counters: Arc<Counters>,
}

impl Orchestrator {
    pub fn new(
        source: SharedSource,
        store: DisplayStore,
        events: mpsc::UnboundedSender<DomainEvent>,
        config: PollingConfig,
    ) -> Self {
        Self {
            source,
            lyrics: None,
            store,
            events,
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Enrich new tracks with lyrics from `provider`.
    pub fn with_lyrics(mut self, provider: Arc<dyn LyricsProvider>) -> Self {
        self.lyrics = Some(provider);
        self
    }

    pub fn stats(&self) -> PollingStats {
        snapshot(&self.counters)
    }

    /// Run a single poll cycle.
    ///
    /// Only fails when the event receiver has gone away.
    pub async fn poll_once(&self) -> Result<PollOutcome> {
        self.counters.polls.fetch_add(1, Ordering::Relaxed);

        let fetched = match tokio::time::timeout(self.config.fetch_timeout, self.source.fetch_current()).await {
            Ok(Ok(track)) => track,
            Ok(Err(e)) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(source = %self.source.kind(), error = %e, "Fetch failed");
                None
            }
            Err(_) => {
                self.counters.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    source = %self.source.kind(),
                    timeout = ?self.config.fetch_timeout,
                    "Fetch timed out"
                );
                None
            }
        };

        let previous = self.store.track();
        match classify(previous.as_ref(), fetched) {
            Transition::NoTrack => Ok(PollOutcome::Idle),
            Transition::NewTrack(track) => {
                let track = self.enrich(track).await;
                info!(
                    id = %track.id,
                    title = %track.title,
                    artist = %track.artist,
                    "Track changed"
                );
                self.store.set_track(track.clone());
                self.counters.track_changes.fetch_add(1, Ordering::Relaxed);
                self.emit(DomainEvent::TrackChanged { track })?;
                Ok(PollOutcome::TrackChanged)
            }
            Transition::SameTrackProgress(track) => {
                self.store.update_progress(track.progress_ms, track.is_playing);
                let (progress_ms, is_playing) = self
                    .store
                    .track()
                    .map(|t| (t.progress_ms, t.is_playing))
                    .unwrap_or((track.progress_ms, track.is_playing));
                self.counters.progress_updates.fetch_add(1, Ordering::Relaxed);
                self.emit(DomainEvent::ProgressUpdated {
                    progress_ms,
                    is_playing,
                })?;
                Ok(PollOutcome::ProgressUpdated)
            }
        }
    }

    async fn enrich(&self, mut track: Track) -> Track {
        let Some(lyrics) = self.lyrics.as_ref() else {
            return track;
        };
        if track.has_lyrics() {
            return track;
        }

        self.counters.enrichment_attempts.fetch_add(1, Ordering::Relaxed);
        let lookup = lyrics.lookup(&track.artist, &track.title);
        match tokio::time::timeout(self.config.enrichment_timeout, lookup).await {
            Ok(Ok(Some(text))) => track.lyrics = Some(text),
            Ok(Ok(None)) => debug!(title = %track.title, "No lyrics available"),
            Ok(Err(e)) => {
                self.counters.enrichment_failures.fetch_add(1, Ordering::Relaxed);
                warn!(title = %track.title, error = %e, "Lyrics lookup failed");
            }
            Err(_) => {
                self.counters.enrichment_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    title = %track.title,
                    timeout = ?self.config.enrichment_timeout,
                    "Lyrics lookup timed out"
                );
            }
        }
        track
    }

    fn emit(&self, event: DomainEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| PollingError::ChannelClosed)
    }

    /// Spawn the poll loop.
    pub fn start(self) -> PollingTask {
        PollingTask::start(self)
    }
}

fn snapshot(counters: &Counters) -> PollingStats {
    PollingStats {
        polls: counters.polls.load(Ordering::Relaxed),
        fetch_failures: counters.fetch_failures.load(Ordering::Relaxed),
        track_changes: counters.track_changes.load(Ordering::Relaxed),
        progress_updates: counters.progress_updates.load(Ordering::Relaxed),
        enrichment_attempts: counters.enrichment_attempts.load(Ordering::Relaxed),
        enrichment_failures: counters.enrichment_failures.load(Ordering::Relaxed),
    }
}

/// A running poll loop.
#[derive(Debug)]
pub struct PollingTask {
    /// Task handle for the background polling loop
    task_handle: JoinHandle<()>,

    /// Shutdown signal for graceful termination
    shutdown_tx: mpsc::Sender<()>,

    /// When this task was started
    started_at: SystemTime,

    counters: Arc<Counters>,
}

impl PollingTask {
    /// Create and start a new polling task
    pub fn start(orchestrator: Orchestrator) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let counters = Arc::clone(&orchestrator.counters);

        let task_handle = tokio::spawn(async move {
            Self::polling_loop(orchestrator, shutdown_rx).await;
        });

        Self {
            task_handle,
            shutdown_tx,
            started_at: SystemTime::now(),
            counters,
        }
    }

    /// Main polling loop
    async fn polling_loop(orchestrator: Orchestrator, mut shutdown_rx: mpsc::Receiver<()>) {
        info!(
            source = %orchestrator.source.kind(),
            interval = ?orchestrator.config.interval,
            "Starting polling task"
        );

        loop {
            // Store write and emit follow the last await, so dropping a cycle
            // mid-fetch or mid-enrichment leaves no partial update
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Polling task shutting down during poll cycle");
                    break;
                }
                result = orchestrator.poll_once() => {
                    if let Err(e) = result {
                        // Only a closed event channel ends up here
                        warn!(error = %e, "Stopping polling task");
                        return;
                    }
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Polling task shutting down");
                    break;
                }
                _ = tokio::time::sleep(orchestrator.config.interval) => {}
            }
        }
    }

    pub fn stats(&self) -> PollingStats {
        snapshot(&self.counters)
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed().unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }

    /// Signal the loop and wait for it to stop.
    ///
    /// A cycle in flight is abandoned at its current fetch or lookup.
    pub async fn shutdown(self) -> Result<PollingStats> {
        let _ = self.shutdown_tx.send(()).await;
        self.task_handle
            .await
            .map_err(|e| PollingError::TaskFailed(e.to_string()))?;
        Ok(snapshot(&self.counters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_display() {
        let stats = PollingStats {
            polls: 12,
            fetch_failures: 1,
            track_changes: 2,
            progress_updates: 9,
            enrichment_attempts: 2,
            enrichment_failures: 1,
        };
        let printed = stats.to_string();
        assert!(printed.contains("Polls: 12"));
        assert!(printed.contains("Track changes: 2"));
        assert!(printed.contains("2 attempted, 1 failed"));
    }
}
