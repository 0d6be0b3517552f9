//! Shared state for the spindle now-playing system.
//!
//! This crate holds everything the server, the polling loop and the panel
//! clients agree on:
//!
//! - [`Track`], [`DisplayMode`] and [`DisplayState`]: the data model
//! - [`DomainEvent`]: the event channel message set
//! - [`InputEvent`] and [`ClientMessage`]: the control channel
//! - [`DisplayStore`]: the single authoritative display record
//! - [`classify`]: the track change detector
//!
//! # Example
//!
//! ```
//! use spindle_state::{classify, DisplayStore, SourceKind, Track, Transition};
//!
//! let store = DisplayStore::new();
//! let fetched = Track::new("t1", "Song", "Band", "Record", SourceKind::Demo);
//!
//! match classify(store.track().as_ref(), Some(fetched)) {
//!     Transition::NewTrack(track) => {
//!         store.set_track(track);
//!     }
//!     Transition::SameTrackProgress(track) => {
//!         store.update_progress(track.progress_ms, track.is_playing);
//!     }
//!     Transition::NoTrack => {}
//! }
//!
//! assert!(store.track().is_some());
//! ```

pub mod control;
pub mod detector;
pub mod error;
pub mod event;
pub mod logging;
pub mod model;
pub mod store;

pub use control::{parse_client_message, ClientMessage, ControlEvent, ControlKind, InputEvent, TransportCommand};
pub use detector::{classify, Transition};
pub use error::{Result, StateError};
pub use event::DomainEvent;
pub use model::{Brightness, DisplayMode, DisplayState, SourceKind, Track, TrackId};
pub use store::DisplayStore;
