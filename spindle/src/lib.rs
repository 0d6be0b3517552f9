//! # spindle
//!
//! Now-playing sync service. One music source is selected at startup and
//! polled on a fixed cadence; track changes, progress and display mode
//! changes are pushed to every connected screen over WebSocket, and those
//! screens send control input back on the same connection.
//!
//! ```text
//! source ──poll──▶ Orchestrator ──events──▶ forwarder ──▶ BroadcastHub ──▶ displays
//!                        │                     ▲                              │
//!                   DisplayStore ◀──── ControlRouter ◀──── control input ─────┘
//! ```
//!
//! The building blocks live in the member crates:
//! [`spindle_state`] (model, store, detector), [`spindle_sources`] (providers
//! and selection), [`spindle_stream`] (poll loop) and [`spindle_hub`]
//! (WebSocket and REST server). This crate wires them together.

pub mod app;
pub mod config;
pub mod control;
pub mod error;

pub use app::{select_source, SelectedSource, Spindle};
pub use config::{Args, Config};
pub use control::ControlRouter;
pub use error::{AppError, Result};
