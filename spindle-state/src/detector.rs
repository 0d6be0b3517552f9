//! Track change detection.
//!
//! Classifies each poll result against the currently displayed track. A new
//! track is expensive downstream (enrichment, e-ink redraw) while a progress
//! update on the same track is cheap and frequent.

use crate::model::Track;

/// Outcome of comparing a fetched snapshot with the previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Nothing fetched this cycle; previous state is retained
    NoTrack,
    /// A track with a different identifier, or the first track seen
    NewTrack(Track),
    /// Same identifier as before, progress or playing flag may have moved
    SameTrackProgress(Track),
}

impl Transition {
    pub fn is_new_track(&self) -> bool {
        matches!(self, Transition::NewTrack(_))
    }

    pub fn track(&self) -> Option<&Track> {
        match self {
            Transition::NoTrack => None,
            Transition::NewTrack(t) | Transition::SameTrackProgress(t) => Some(t),
        }
    }
}

/// Classify a fetched snapshot against the previous one.
///
/// # Example
///
/// ```
/// use spindle_state::{classify, SourceKind, Track, Transition};
///
/// let a = Track::new("t1", "A", "X", "Y", SourceKind::Demo);
/// let b = Track::new("t2", "B", "X", "Y", SourceKind::Demo);
///
/// assert_eq!(classify(Some(&a), None), Transition::NoTrack);
/// assert!(classify(Some(&a), Some(b)).is_new_track());
/// assert!(!classify(Some(&a), Some(a.clone())).is_new_track());
/// ```
pub fn classify(previous: Option<&Track>, fetched: Option<Track>) -> Transition {
    match (previous, fetched) {
        (_, None) => Transition::NoTrack,
        (Some(prev), Some(fetched)) if prev.same_track(&fetched) => {
            Transition::SameTrackProgress(fetched)
        }
        (_, Some(fetched)) => Transition::NewTrack(fetched),
    }
}
