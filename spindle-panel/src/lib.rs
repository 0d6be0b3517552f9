//! Hardware display client for spindle.
//!
//! A panel keeps one WebSocket connection to the hub alive forever,
//! reconnecting with capped exponential [`Backoff`]. Events drive two render
//! paths through a [`PanelRenderer`]:
//!
//! - the expensive path (e-ink) runs only when the track identifier differs
//!   from the last one this panel rendered, see [`PanelState`];
//! - the cheap path (OLED) runs on every progress event and on a local
//!   one-second tick while a track is playing.
//!
//! An optional [`InputSource`] forwards encoder and touch input back to the
//! hub as control messages.

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod renderer;
pub mod state;

pub use backoff::Backoff;
pub use client::{InputSource, PanelClient, PanelHandle, PanelStats};
pub use config::{PanelConfig, BACKEND_URL_ENV};
pub use error::{PanelError, Result};
pub use input::{parse_key, KeyboardInput, LineInput};
pub use renderer::{format_time, LogRenderer, PanelRenderer};
pub use state::{PanelState, RenderAction};
