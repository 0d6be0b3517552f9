use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use spindle_state::{SourceKind, Track};

use super::Recognizer;
use crate::error::Result;
use crate::source::MusicSource;

#[derive(Debug, Clone)]
struct Identified {
    track: Track,
    at: Instant,
}

/// Buffers the latest identification for the polling loop.
///
/// Progress is derived from the time since the track was first identified,
/// clamped to its duration. Re-identifying the same track keeps the original
/// start so progress keeps advancing.
#[derive(Debug, Clone, Default)]
pub struct FingerprintSource {
    latest: Arc<RwLock<Option<Identified>>>,
}

impl FingerprintSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an identification result.
    pub fn store(&self, track: Track) {
        let mut latest = self.latest.write();
        match latest.as_ref() {
            Some(current) if current.track.same_track(&track) => {}
            _ => {
                *latest = Some(Identified {
                    track,
                    at: Instant::now(),
                })
            }
        }
    }

    /// Latest identified track with derived progress.
    pub fn current(&self) -> Option<Track> {
        let latest = self.latest.read();
        latest.as_ref().map(|identified| {
            let elapsed = identified.at.elapsed().as_millis() as u64;
            let progress = identified.track.progress_ms + elapsed;
            identified.track.clone().with_progress(progress, true)
        })
    }

    /// Spawn the background listen loop feeding this source.
    ///
    /// After each sample the loop waits `interval`, or `error_backoff` when
    /// the sample failed. The loop stops when the returned handle is shut
    /// down.
    pub fn listen(
        &self,
        recognizer: Arc<dyn Recognizer>,
        interval: Duration,
        error_backoff: Duration,
    ) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let stats = Arc::new(ListenerCounters::default());

        let task_source = self.clone();
        let task_stats = Arc::clone(&stats);
        let task_handle = tokio::spawn(async move {
            Self::listen_loop(
                task_source,
                recognizer,
                interval,
                error_backoff,
                shutdown_rx,
                task_stats,
            )
            .await;
        });

        ListenerHandle {
            shutdown_tx,
            task_handle,
            stats,
        }
    }

    async fn listen_loop(
        source: FingerprintSource,
        recognizer: Arc<dyn Recognizer>,
        interval: Duration,
        error_backoff: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
        stats: Arc<ListenerCounters>,
    ) {
        info!("Audio listener started");

        loop {
            let result = tokio::select! {
                _ = shutdown_rx.recv() => break,
                result = recognizer.identify() => result,
            };
            stats.samples.fetch_add(1, Ordering::Relaxed);

            let delay = match result {
                Ok(Some(track)) => {
                    stats.matches.fetch_add(1, Ordering::Relaxed);
                    source.store(track);
                    interval
                }
                Ok(None) => {
                    debug!("No match for audio sample");
                    interval
                }
                Err(e) => {
                    stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "Audio listener sample failed");
                    error_backoff
                }
            };

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Audio listener stopped");
    }
}

#[async_trait]
impl MusicSource for FingerprintSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Fingerprint
    }

    async fn fetch_current(&self) -> Result<Option<Track>> {
        Ok(self.current())
    }
}

#[derive(Debug, Default)]
struct ListenerCounters {
    samples: AtomicU64,
    matches: AtomicU64,
    errors: AtomicU64,
}

/// Counters for a running listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerStats {
    pub samples: u64,
    pub matches: u64,
    pub errors: u64,
}

/// Handle to a running listen loop.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task_handle: JoinHandle<()>,
    stats: Arc<ListenerCounters>,
}

impl ListenerHandle {
    pub fn stats(&self) -> ListenerStats {
        ListenerStats {
            samples: self.stats.samples.load(Ordering::Relaxed),
            matches: self.stats.matches.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.task_handle.is_finished()
    }

    /// Signal the loop and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task_handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Recognizer that replays scripted results, then reports no match.
    struct Scripted {
        results: Mutex<VecDeque<Result<Option<Track>>>>,
    }

    impl Scripted {
        fn new(results: Vec<Result<Option<Track>>>) -> Arc<Self> {
            Arc::new(Self {
                results: Mutex::new(results.into()),
            })
        }
    }

    #[async_trait]
    impl Recognizer for Scripted {
        fn is_available(&self) -> bool {
            true
        }

        async fn identify(&self) -> Result<Option<Track>> {
            self.results.lock().pop_front().unwrap_or(Ok(None))
        }
    }

    fn track(id: &str) -> Track {
        Track::new(id, "Title", "Artist", "Album", SourceKind::Fingerprint).with_duration(200_000)
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_derives_progress() {
        let source = FingerprintSource::new();
        assert!(source.fetch_current().await.unwrap().is_none());

        source.store(track("r1"));
        tokio::time::advance(Duration::from_secs(3)).await;
        source.store(track("r1"));

        let current = source.fetch_current().await.unwrap().unwrap();
        assert_eq!(current.progress_ms, 3_000);
        assert!(current.is_playing);

        source.store(track("r2"));
        assert_eq!(source.current().unwrap().progress_ms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listen_loop_buffers_latest_and_backs_off() {
        let source = FingerprintSource::new();
        let recognizer = Scripted::new(vec![
            Err(SourceError::Recognizer("mic busy".to_string())),
            Ok(Some(track("r1"))),
        ]);

        let handle = source.listen(recognizer, Duration::from_secs(2), Duration::from_secs(5));

        // First sample fails immediately, then waits the error backoff
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.stats().errors, 1);
        assert!(source.current().is_none());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.stats().matches, 1);
        assert_eq!(source.current().unwrap().id.as_str(), "r1");

        assert!(handle.is_running());
        handle.shutdown().await;
    }
}
