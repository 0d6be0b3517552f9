//! Orchestrator behaviour against scripted sources and lyrics providers.

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use spindle_sources::{LyricsProvider, MusicSource, SourceError};
use spindle_state::{DisplayStore, DomainEvent, SourceKind, Track};
use spindle_stream::{Orchestrator, PollOutcome, PollingConfig};

// ============================================================================
// Test Helpers
// ============================================================================

/// Source that replays scripted fetch results, then reports nothing.
struct ScriptedSource {
    script: Mutex<VecDeque<Result<Option<Track>, SourceError>>>,
    delay: Option<Duration>,
}

impl ScriptedSource {
    fn new(script: Vec<Result<Option<Track>, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            delay: None,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::from(vec![Ok(Some(track("slow", 0)))])),
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl MusicSource for ScriptedSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Spotify
    }

    async fn fetch_current(&self) -> Result<Option<Track>, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().pop_front();
        next.unwrap_or(Ok(None))
    }
}

/// Lyrics provider that counts lookups.
struct CountingLyrics {
    calls: AtomicUsize,
    answer: Option<String>,
    fail: bool,
    delay: Option<Duration>,
}

impl CountingLyrics {
    fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer: Some(text.to_string()),
            fail: false,
            delay: None,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer: None,
            fail: true,
            delay: None,
        })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            answer: Some("too late".to_string()),
            fail: false,
            delay: Some(Duration::from_secs(3600)),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LyricsProvider for CountingLyrics {
    async fn lookup(&self, _artist: &str, _title: &str) -> Result<Option<String>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SourceError::Status {
                endpoint: "/lyrics".to_string(),
                status: 500,
            });
        }
        Ok(self.answer.clone())
    }
}

fn track(id: &str, progress_ms: u64) -> Track {
    Track::new(id, format!("Title {id}"), "Artist", "Album", SourceKind::Spotify)
        .with_duration(354_000)
        .with_progress(progress_ms, true)
}

fn drain(rx: &mut mpsc::UnboundedReceiver<DomainEvent>) -> Vec<DomainEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn orchestrator(
    source: Arc<ScriptedSource>,
    store: DisplayStore,
) -> (Orchestrator, mpsc::UnboundedReceiver<DomainEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Orchestrator::new(source, store, tx, PollingConfig::default()), rx)
}

// ============================================================================
// Single cycles
// ============================================================================

#[tokio::test]
async fn test_track_change_emits_once_and_enriches_once() {
    let store = DisplayStore::new();
    store.set_track(track("t1", 100_000).with_lyrics("old words"));

    let source = ScriptedSource::new(vec![
        Ok(Some(track("t2", 0))),
        Ok(Some(track("t2", 500))),
        Ok(Some(track("t2", 1_000))),
    ]);
    let lyrics = CountingLyrics::answering("new words");
    let (orch, mut rx) = orchestrator(source, store.clone());
    let orch = orch.with_lyrics(lyrics.clone());

    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::TrackChanged);
    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::ProgressUpdated);
    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::ProgressUpdated);

    let events = drain(&mut rx);
    assert_eq!(events.len(), 3);
    match &events[0] {
        DomainEvent::TrackChanged { track } => {
            assert_eq!(track.id.as_str(), "t2");
            assert_eq!(track.lyrics.as_deref(), Some("new words"));
        }
        other => panic!("expected track change, got {other:?}"),
    }
    assert_eq!(
        events[2],
        DomainEvent::ProgressUpdated {
            progress_ms: 1_000,
            is_playing: true
        }
    );

    assert_eq!(lyrics.calls(), 1);
    assert_eq!(store.track().unwrap().progress_ms, 1_000);
    assert_eq!(store.track().unwrap().lyrics.as_deref(), Some("new words"));

    let stats = orch.stats();
    assert_eq!(stats.track_changes, 1);
    assert_eq!(stats.enrichment_attempts, 1);
}

#[tokio::test]
async fn test_track_with_lyrics_skips_lookup() {
    let source = ScriptedSource::new(vec![Ok(Some(track("t1", 0).with_lyrics("already here")))]);
    let lyrics = CountingLyrics::answering("unused");
    let (orch, mut rx) = orchestrator(source, DisplayStore::new());
    let orch = orch.with_lyrics(lyrics.clone());

    orch.poll_once().await.unwrap();
    assert_eq!(lyrics.calls(), 0);
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn test_nothing_fetched_keeps_state_and_is_silent() {
    let store = DisplayStore::new();
    store.set_track(track("t1", 5_000));

    let source = ScriptedSource::new(vec![Ok(None)]);
    let (orch, mut rx) = orchestrator(source, store.clone());

    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::Idle);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(store.track().unwrap().id.as_str(), "t1");
}

#[tokio::test]
async fn test_fetch_error_is_not_fatal() {
    let source = ScriptedSource::new(vec![
        Err(SourceError::Status {
            endpoint: "/v1/me/player".to_string(),
            status: 503,
        }),
        Ok(Some(track("t1", 0))),
    ]);
    let (orch, mut rx) = orchestrator(source, DisplayStore::new());

    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::Idle);
    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::TrackChanged);
    assert_eq!(drain(&mut rx).len(), 1);
    assert_eq!(orch.stats().fetch_failures, 1);
}

#[tokio::test]
async fn test_enrichment_failure_still_delivers_track() {
    let source = ScriptedSource::new(vec![Ok(Some(track("t1", 0)))]);
    let lyrics = CountingLyrics::failing();
    let (orch, mut rx) = orchestrator(source, DisplayStore::new());
    let orch = orch.with_lyrics(lyrics.clone());

    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::TrackChanged);
    match drain(&mut rx).first() {
        Some(DomainEvent::TrackChanged { track }) => assert!(track.lyrics.is_none()),
        other => panic!("expected track change, got {other:?}"),
    }
    assert_eq!(orch.stats().enrichment_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_enrichment_is_bounded_by_timeout() {
    let source = ScriptedSource::new(vec![Ok(Some(track("t1", 0)))]);
    let lyrics = CountingLyrics::hanging();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = Orchestrator::new(
        source,
        DisplayStore::new(),
        tx,
        PollingConfig::default().with_enrichment_timeout(Duration::from_secs(10)),
    )
    .with_lyrics(lyrics.clone());

    let started = tokio::time::Instant::now();
    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::TrackChanged);
    assert!(started.elapsed() < Duration::from_secs(11));

    match drain(&mut rx).first() {
        Some(DomainEvent::TrackChanged { track }) => assert!(track.lyrics.is_none()),
        other => panic!("expected track change, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_fetch_is_bounded_by_timeout() {
    let source = ScriptedSource::slow(Duration::from_secs(60));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = Orchestrator::new(
        source,
        DisplayStore::new(),
        tx,
        PollingConfig::default().with_fetch_timeout(Duration::from_secs(2)),
    );

    assert_eq!(orch.poll_once().await.unwrap(), PollOutcome::Idle);
    assert!(drain(&mut rx).is_empty());
    assert_eq!(orch.stats().fetch_failures, 1);
}

#[tokio::test]
async fn test_progress_event_is_clamped_to_duration() {
    let store = DisplayStore::new();
    store.set_track(track("t1", 0));

    let mut overrun = track("t1", 0);
    overrun.progress_ms = 400_000;
    let source = ScriptedSource::new(vec![Ok(Some(overrun))]);
    let (orch, mut rx) = orchestrator(source, store);

    orch.poll_once().await.unwrap();
    assert_eq!(
        drain(&mut rx),
        vec![DomainEvent::ProgressUpdated {
            progress_ms: 354_000,
            is_playing: true
        }]
    );
}

#[tokio::test]
async fn test_closed_channel_is_reported() {
    let source = ScriptedSource::new(vec![Ok(Some(track("t1", 0)))]);
    let (orch, rx) = orchestrator(source, DisplayStore::new());
    drop(rx);

    assert!(orch.poll_once().await.is_err());
}

// ============================================================================
// Spawned loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_loop_polls_on_interval_and_shuts_down() {
    let source = ScriptedSource::new(vec![
        Ok(Some(track("t1", 0))),
        Ok(Some(track("t1", 500))),
        Ok(Some(track("t2", 0))),
    ]);
    let (orch, mut rx) = orchestrator(source, DisplayStore::new());
    let task = orch.start();

    let mut kinds = Vec::new();
    for _ in 0..3 {
        let event = rx.recv().await.unwrap();
        kinds.push(event.kind());
    }
    assert_eq!(kinds, vec!["track_update", "progress_update", "track_update"]);
    assert!(task.is_running());

    let stats = task.shutdown().await.unwrap();
    assert!(stats.polls >= 3);
    assert_eq!(stats.track_changes, 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_fetch_in_flight() {
    let source = ScriptedSource::slow(Duration::from_secs(60));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = Orchestrator::new(
        source,
        DisplayStore::new(),
        tx,
        PollingConfig::default().with_fetch_timeout(Duration::from_secs(30)),
    );
    let task = orch.start();

    // Let the loop enter the fetch
    tokio::time::sleep(Duration::from_secs(1)).await;

    let started = tokio::time::Instant::now();
    let stats = task.shutdown().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(stats.polls, 1);
    assert_eq!(stats.fetch_failures, 0);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_interrupts_enrichment_in_flight() {
    let source = ScriptedSource::new(vec![Ok(Some(track("t1", 0)))]);
    let store = DisplayStore::new();
    let lyrics = CountingLyrics::hanging();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = Orchestrator::new(
        source,
        store.clone(),
        tx,
        PollingConfig::default().with_enrichment_timeout(Duration::from_secs(30)),
    )
    .with_lyrics(lyrics.clone());
    let task = orch.start();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(lyrics.calls(), 1);

    let started = tokio::time::Instant::now();
    task.shutdown().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(store.track().is_none());
    assert!(drain(&mut rx).is_empty());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// The number of TrackChanged events equals the number of identifier
    /// changes in the fetched sequence, and lyrics are looked up once each.
    #[test]
    fn prop_one_track_change_per_identifier_change(
        ids in prop::collection::vec(prop::option::of(0u8..3), 1..40)
    ) {
        let mut expected_changes = 0;
        let mut last: Option<u8> = None;
        for id in ids.iter().flatten() {
            if last != Some(*id) {
                expected_changes += 1;
                last = Some(*id);
            }
        }

        let script = ids
            .iter()
            .map(|id| Ok(id.map(|id| track(&format!("t{id}"), 0))))
            .collect();
        let source = ScriptedSource::new(script);
        let lyrics = CountingLyrics::answering("words");
        let (orch, mut rx) = orchestrator(source, DisplayStore::new());
        let orch = orch.with_lyrics(lyrics.clone());

        tokio_test::block_on(async {
            for _ in 0..ids.len() {
                orch.poll_once().await.unwrap();
            }
        });

        let changes = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, DomainEvent::TrackChanged { .. }))
            .count();
        prop_assert_eq!(changes, expected_changes);
        prop_assert_eq!(lyrics.calls(), expected_changes);
    }
}
