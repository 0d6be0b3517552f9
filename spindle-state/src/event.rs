//! Domain events fanned out to every connected consumer.
//!
//! Each variant maps to one JSON message on the event channel, tagged by a
//! `type` field:
//!
//! ```text
//! {"type":"init","state":{..},"track":{..}|null}
//! {"type":"track_update","track":{..}}
//! {"type":"progress_update","progress_ms":1000,"is_playing":true}
//! {"type":"mode_change","mode":"lyrics"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{DisplayMode, DisplayState, Track};

/// An immutable event produced by the orchestrator or the control router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// Full snapshot sent once to each newly connected consumer
    #[serde(rename = "init")]
    Init {
        state: DisplayState,
        track: Option<Track>,
    },

    /// A different track is now active
    #[serde(rename = "track_update")]
    TrackChanged { track: Track },

    /// Same track, progress or playing flag moved
    #[serde(rename = "progress_update")]
    ProgressUpdated { progress_ms: u64, is_playing: bool },

    /// Display mode changed
    #[serde(rename = "mode_change")]
    ModeChanged { mode: DisplayMode },
}

impl DomainEvent {
    /// Build the init event for a snapshot of the store.
    pub fn init(state: DisplayState) -> Self {
        let track = state.track.clone();
        DomainEvent::Init { state, track }
    }

    /// Wire name of this event, as written in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::Init { .. } => "init",
            DomainEvent::TrackChanged { .. } => "track_update",
            DomainEvent::ProgressUpdated { .. } => "progress_update",
            DomainEvent::ModeChanged { .. } => "mode_change",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceKind;
    use serde_json::json;

    #[test]
    fn test_init_wire_shape() {
        let track = Track::new("t1", "Song", "Band", "Record", SourceKind::Spotify);
        let state = DisplayState {
            track: Some(track),
            ..Default::default()
        };

        let value = serde_json::to_value(DomainEvent::init(state)).unwrap();
        assert_eq!(value["type"], "init");
        assert_eq!(value["state"]["mode"], "album_art");
        assert_eq!(value["state"]["brightness"], 50);
        assert_eq!(value["track"]["id"], "t1");
        assert_eq!(value["state"]["track"]["id"], "t1");
    }

    #[test]
    fn test_init_without_track_is_null() {
        let value = serde_json::to_value(DomainEvent::init(DisplayState::default())).unwrap();
        assert!(value["track"].is_null());
        assert!(value.get("track").is_some());
    }

    #[test]
    fn test_progress_and_mode_wire_shape() {
        let progress = DomainEvent::ProgressUpdated {
            progress_ms: 1200,
            is_playing: true,
        };
        assert_eq!(
            serde_json::to_value(&progress).unwrap(),
            json!({"type": "progress_update", "progress_ms": 1200, "is_playing": true})
        );

        let mode = DomainEvent::ModeChanged {
            mode: DisplayMode::ArtistInfo,
        };
        assert_eq!(
            serde_json::to_value(&mode).unwrap(),
            json!({"type": "mode_change", "mode": "artist_info"})
        );
    }

    #[test]
    fn test_decode_track_update() {
        let text = r#"{"type":"track_update","track":{"id":"t2","title":"B","artist":"X","album":"Y","album_art_url":null,"duration_ms":1000,"progress_ms":0,"is_playing":true,"source":"lastfm"}}"#;
        let event = DomainEvent::from_json(text).unwrap();

        match event {
            DomainEvent::TrackChanged { track } => {
                assert_eq!(track.id.as_str(), "t2");
                assert_eq!(track.source, SourceKind::LastFm);
                assert!(track.lyrics.is_none());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_kind_matches_wire_tag() {
        let events = [
            DomainEvent::init(DisplayState::default()),
            DomainEvent::ProgressUpdated {
                progress_ms: 0,
                is_playing: false,
            },
            DomainEvent::ModeChanged {
                mode: DisplayMode::Minimal,
            },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], event.kind());
        }
    }
}
