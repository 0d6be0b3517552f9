//! Polling orchestrator for spindle.
//!
//! [`Orchestrator`] polls the active source on a fixed interval, runs each
//! snapshot through the track change detector and emits
//! [`DomainEvent`](spindle_state::DomainEvent)s on an unbounded channel in
//! the order they happen. [`PollingTask`] owns the spawned loop.

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::PollingConfig;
pub use error::{PollingError, Result};
pub use orchestrator::{Orchestrator, PollOutcome, PollingStats, PollingTask};
