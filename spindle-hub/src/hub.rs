//! Registry of live consumer connections and best-effort fan-out.
//!
//! Every connection owns a bounded outbox. The hub serializes each event
//! once and pushes the same frame into every outbox; the per-socket writer
//! task drains its outbox onto the transport. A send fails when the writer
//! has dropped its outbox or when the outbox is full because the consumer
//! stopped reading. Either way the connection is pruned.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use spindle_state::{DisplayStore, DomainEvent};

use crate::error::Result;

/// Frames a consumer may fall behind before it is dropped.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 256;

/// Opaque handle for one consumer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The consumer side of a registered connection.
///
/// Yields serialized event frames in broadcast order. `recv` returns `None`
/// once the hub has dropped the connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    outbox: mpsc::Receiver<Arc<str>>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Next frame for this consumer.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.outbox.recv().await
    }
}

/// Fans domain events out to every connected consumer.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone)]
pub struct BroadcastHub {
    connections: Arc<RwLock<HashMap<ConnectionId, mpsc::Sender<Arc<str>>>>>,
    store: DisplayStore,
    outbox_capacity: usize,
}

impl BroadcastHub {
    /// Create a hub that greets new consumers from `store`.
    pub fn new(store: DisplayStore) -> Self {
        Self::with_outbox_capacity(store, DEFAULT_OUTBOX_CAPACITY)
    }

    /// Create a hub whose consumers may buffer at most `capacity` frames.
    ///
    /// The capacity counts the `init` frame and is at least 1.
    pub fn with_outbox_capacity(store: DisplayStore, capacity: usize) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            store,
            outbox_capacity: capacity.max(1),
        }
    }

    pub fn store(&self) -> &DisplayStore {
        &self.store
    }

    /// Register a new consumer.
    ///
    /// The returned connection already holds an `init` frame with the
    /// store's state and track as of registration. The snapshot is taken
    /// under the registry write lock, so no broadcast can slip in between
    /// the snapshot and the registration.
    pub async fn connect(&self) -> Result<Connection> {
        let id = ConnectionId::new();
        let (tx, outbox) = mpsc::channel(self.outbox_capacity);

        let mut connections = self.connections.write().await;
        let init = DomainEvent::init(self.store.snapshot()).to_json()?;
        // The receiver is alive and the outbox empty in this scope
        let _ = tx.try_send(Arc::from(init));
        connections.insert(id, tx);

        info!(connection = %id, total = connections.len(), "Consumer connected");
        Ok(Connection { id, outbox })
    }

    /// Remove a consumer. Unknown ids are ignored.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if connections.remove(&id).is_some() {
            info!(connection = %id, total = connections.len(), "Consumer disconnected");
        }
    }

    /// Send `event` to every registered consumer.
    ///
    /// Connections whose send fails are removed after the pass; delivery to
    /// the others is unaffected. A full outbox counts as a failed send.
    /// Never waits on a consumer. Returns the number of consumers the event
    /// was handed to.
    pub async fn broadcast(&self, event: &DomainEvent) -> Result<usize> {
        let frame: Arc<str> = Arc::from(event.to_json()?);

        let (delivered, failed) = {
            let connections = self.connections.read().await;
            let mut delivered = 0;
            let mut failed = Vec::new();
            for (id, tx) in connections.iter() {
                match tx.try_send(Arc::clone(&frame)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        warn!(connection = %id, "Consumer outbox full, dropping consumer");
                        failed.push(*id);
                    }
                    Err(TrySendError::Closed(_)) => failed.push(*id),
                }
            }
            (delivered, failed)
        };

        if !failed.is_empty() {
            let mut connections = self.connections.write().await;
            for id in &failed {
                connections.remove(id);
                debug!(connection = %id, "Pruned dead consumer");
            }
        }

        debug!(kind = event.kind(), delivered, pruned = failed.len(), "Broadcast");
        Ok(delivered)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Drop every connection, ending their outboxes.
    pub async fn close_all(&self) {
        let mut connections = self.connections.write().await;
        let count = connections.len();
        connections.clear();
        if count > 0 {
            info!(count, "Closed all consumer connections");
        }
    }
}
