//! Property-based tests for mode rotation, change detection and the store.

use proptest::prelude::*;

use spindle_state::{classify, DisplayMode, DisplayStore, SourceKind, Track, Transition};

// ============================================================================
// Test Helpers
// ============================================================================

fn track(id: &str, progress_ms: u64) -> Track {
    Track::new(id, "Title", "Artist", "Album", SourceKind::Spotify)
        .with_duration(600_000)
        .with_progress(progress_ms, true)
}

/// Strategy for a single poll result: none, or one of a few track ids
fn fetch_strategy() -> impl Strategy<Value = Option<(u8, u64)>> {
    prop::option::weighted(0.8, (0u8..4, 0u64..600_000))
}

fn mode_strategy() -> impl Strategy<Value = DisplayMode> {
    prop::sample::select(DisplayMode::ALL.to_vec())
}

// ============================================================================
// Mode rotation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Rotating from index `i` by `delta` lands on index `(i + delta) mod len`,
    /// for negative deltas and magnitudes larger than the list.
    #[test]
    fn prop_rotate_is_modular(mode in mode_strategy(), delta in any::<i64>()) {
        let len = DisplayMode::ALL.len() as i128;
        let expected = (mode.index() as i128 + delta as i128).rem_euclid(len) as usize;
        prop_assert_eq!(mode.rotate(delta), DisplayMode::ALL[expected]);
    }

    /// Rotating forward then back is the identity.
    #[test]
    fn prop_rotate_inverse(mode in mode_strategy(), delta in -50i64..50) {
        prop_assert_eq!(mode.rotate(delta).rotate(-delta), mode);
    }

    /// The store applies the same arithmetic as `DisplayMode::rotate`.
    #[test]
    fn prop_store_rotation_matches_mode(deltas in prop::collection::vec(-7i64..7, 0..20)) {
        let store = DisplayStore::new();
        let mut expected = DisplayMode::AlbumArt;
        for delta in deltas {
            expected = expected.rotate(delta);
            prop_assert_eq!(store.rotate_mode(delta), expected);
        }
        prop_assert_eq!(store.mode(), expected);
    }
}

// ============================================================================
// Change detection
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Over any poll sequence, a NewTrack is produced exactly when the fetched
    /// id differs from the last retained one, and never twice in a row for the
    /// same id.
    #[test]
    fn prop_new_track_only_on_id_change(fetches in prop::collection::vec(fetch_strategy(), 1..60)) {
        let store = DisplayStore::new();
        let mut last_id: Option<String> = None;

        for fetch in fetches {
            let fetched = fetch.map(|(id, progress)| track(&format!("t{id}"), progress));
            let previous = store.track();
            let transition = classify(previous.as_ref(), fetched.clone());

            match (&fetched, &transition) {
                (None, Transition::NoTrack) => {}
                (Some(f), Transition::NewTrack(t)) => {
                    prop_assert_ne!(last_id.as_deref(), Some(f.id.as_str()));
                    prop_assert!(store.set_track(t.clone()));
                    last_id = Some(f.id.to_string());
                }
                (Some(f), Transition::SameTrackProgress(t)) => {
                    prop_assert_eq!(last_id.as_deref(), Some(f.id.as_str()));
                    prop_assert!(store.update_progress(t.progress_ms, t.is_playing));
                }
                (f, t) => prop_assert!(false, "fetched {:?} classified as {:?}", f, t),
            }
        }
    }

    /// Store progress never exceeds duration.
    #[test]
    fn prop_progress_clamped(progress in 0u64..2_000_000) {
        let store = DisplayStore::new();
        store.set_track(track("t1", 0));
        store.update_progress(progress, true);
        let current = store.track().unwrap();
        prop_assert!(current.progress_ms <= current.duration_ms);
    }
}
