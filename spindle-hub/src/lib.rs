//! Broadcast hub for spindle display consumers.
//!
//! [`BroadcastHub`] keeps the registry of live consumer connections and fans
//! every [`DomainEvent`](spindle_state::DomainEvent) out to all of them; a
//! consumer whose send fails is pruned without affecting the rest.
//! [`HubServer`] puts the hub behind a WebSocket endpoint and a small REST
//! surface, and hands control input to a [`ControlHandler`].
//!
//! # Example
//!
//! ```
//! use spindle_hub::BroadcastHub;
//! use spindle_state::{DisplayMode, DisplayStore, DomainEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hub = BroadcastHub::new(DisplayStore::new());
//! let mut consumer = hub.connect().await.unwrap();
//!
//! // Every consumer starts with a full snapshot
//! let init = consumer.recv().await.unwrap();
//! assert!(init.contains(r#""type":"init""#));
//!
//! hub.broadcast(&DomainEvent::ModeChanged { mode: DisplayMode::Lyrics }).await.unwrap();
//! let frame = consumer.recv().await.unwrap();
//! assert!(frame.contains("mode_change"));
//! # }
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod hub;
pub mod server;

pub use config::HubServerConfig;
pub use control::{ControlHandler, SourceStatus};
pub use error::{HubError, Result};
pub use hub::{BroadcastHub, Connection, ConnectionId, DEFAULT_OUTBOX_CAPACITY};
pub use server::{routes, HubServer, SERVICE_NAME};
