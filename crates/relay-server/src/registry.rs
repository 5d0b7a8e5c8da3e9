use crate::metrics::counters;
use dashmap::DashMap;
use futures_util::future::join_all;
use relay_common::ClientId;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Handle held in the connection table — used to deliver serialized
/// frames to a connection's task.
#[derive(Clone, Debug)]
pub struct ConnHandle {
    /// Channel sender feeding this connection's write half.
    pub tx: mpsc::Sender<String>,
    /// Instant this connection was accepted. Removal paths are guarded
    /// on it so a replaced connection's teardown never evicts the
    /// registration that superseded it.
    pub connected_at: Instant,
}

/// Process-wide registry: live connections and cached public keys,
/// both keyed by client identifier.
///
/// The connection half exists only while a registered client's socket
/// is open. The public key half is written on registration and never
/// removed, so key lookups keep answering after the owner disconnects.
#[derive(Debug, Default)]
pub struct Registry {
    connections: DashMap<ClientId, ConnHandle>,
    public_keys: DashMap<ClientId, String>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `uuid` to a connection and cache its public key, replacing
    /// any prior bindings for that identifier. Never fails.
    pub fn register(&self, uuid: &str, handle: ConnHandle, public_key: String) {
        self.connections.insert(uuid.to_owned(), handle);
        self.public_keys.insert(uuid.to_owned(), public_key);
        info!(uuid, total_connected = self.connections.len(), "registered");
    }

    /// Remove the connection binding for `uuid` if it still belongs to
    /// the connection accepted at `connected_at`. The cached public key
    /// is untouched; no-op if absent or already replaced.
    pub fn unregister(&self, uuid: &str, connected_at: Instant) {
        self.connections
            .remove_if(uuid, |_k, v| v.connected_at == connected_at);
        info!(uuid, total_connected = self.connections.len(), "disconnected");
    }

    /// Deliver one serialized frame to `uuid`'s live connection.
    ///
    /// Returns `false` without error when no live connection exists.
    /// A failed send means the destination task is gone: the stale
    /// entry is evicted (lazy death detection) and `false` returned.
    /// This is the single chokepoint for all routed outbound traffic.
    pub async fn send_to(&self, uuid: &str, text: String) -> bool {
        let Some(handle) = self.connections.get(uuid).map(|e| e.value().clone()) else {
            return false;
        };
        match handle.tx.send(text).await {
            Ok(()) => true,
            Err(_) => {
                warn!(uuid, "send to dead connection, evicting");
                counters::connections_evicted_total();
                self.connections
                    .remove_if(uuid, |_k, v| v.connected_at == handle.connected_at);
                false
            }
        }
    }

    /// Cached public key for `uuid`, if one was ever registered.
    #[must_use]
    pub fn public_key(&self, uuid: &str) -> Option<String> {
        self.public_keys.get(uuid).map(|e| e.value().clone())
    }

    /// Send `text` to every live connection except `from`.
    ///
    /// Sends run concurrently and independently; per-recipient failures
    /// are swallowed and do not affect delivery to others.
    pub async fn broadcast_except(&self, from: &str, text: &str) {
        let targets: Vec<ClientId> = self
            .connections
            .iter()
            .filter(|entry| entry.key() != from)
            .map(|entry| entry.key().clone())
            .collect();
        debug!(from, recipients = targets.len(), "broadcasting status");
        join_all(
            targets
                .iter()
                .map(|uuid| self.send_to(uuid, text.to_owned())),
        )
        .await;
    }

    /// Number of live registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no client is currently connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
