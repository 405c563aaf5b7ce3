use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::models::{ActorKind, ServerEvent};

/// What the writer task of a connection consumes: either an event to
/// serialize onto the socket, or an instruction to close it.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    Event(ServerEvent),
    Close,
}

/// Cloneable handle that pushes frames to one connection's writer task.
pub type ConnectionHandle = mpsc::UnboundedSender<OutboundFrame>;

#[derive(Clone)]
pub struct PresenceEntry {
    pub connection_id: Uuid,
    pub kind: ActorKind,
    pub handle: ConnectionHandle,
}

/// In-memory map of actor id -> active connection. Ephemeral by design:
/// a restart leaves every actor offline until they reconnect.
///
/// Only a connection's own lifecycle registers or unregisters it; every
/// other component just reads via [`lookup`](Self::lookup).
pub struct PresenceRegistry {
    entries: Arc<RwLock<HashMap<Uuid, PresenceEntry>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a connection for an actor and broadcasts the online status
    /// change. Returns the entry this registration replaced, if any, so the
    /// caller can close the evicted session explicitly.
    pub async fn register(
        &self,
        actor_id: Uuid,
        kind: ActorKind,
        connection_id: Uuid,
        handle: ConnectionHandle,
    ) -> Option<PresenceEntry> {
        let evicted = {
            let mut entries = self.entries.write().await;
            entries.insert(
                actor_id,
                PresenceEntry {
                    connection_id,
                    kind,
                    handle,
                },
            )
        };

        debug!("Actor {} is online", actor_id);
        self.broadcast(ServerEvent::PresenceChanged {
            actor_id,
            is_online: true,
        })
        .await;

        evicted
    }

    /// Removes the actor's entry, but only while it still belongs to
    /// `connection_id` - an evicted connection disconnecting later must not
    /// knock its replacement offline. Returns whether an entry was removed.
    pub async fn unregister(&self, actor_id: Uuid, connection_id: Uuid) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            match entries.get(&actor_id) {
                Some(entry) if entry.connection_id == connection_id => {
                    entries.remove(&actor_id);
                    true
                }
                _ => false,
            }
        };

        if removed {
            debug!("Actor {} is offline", actor_id);
            self.broadcast(ServerEvent::PresenceChanged {
                actor_id,
                is_online: false,
            })
            .await;
        }

        removed
    }

    pub async fn lookup(&self, actor_id: Uuid) -> Option<ConnectionHandle> {
        let entries = self.entries.read().await;
        entries.get(&actor_id).map(|entry| entry.handle.clone())
    }

    pub async fn is_online(&self, actor_id: Uuid) -> bool {
        let entries = self.entries.read().await;
        entries.contains_key(&actor_id)
    }

    pub async fn online_count(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }

    /// Sends an event to every registered connection. Handles whose
    /// connection already went away are skipped silently.
    pub async fn broadcast(&self, event: ServerEvent) {
        let entries = self.entries.read().await;
        for (actor_id, entry) in entries.iter() {
            if entry.handle.send(OutboundFrame::Event(event.clone())).is_err() {
                debug!("Skipping closed connection for actor {}", actor_id);
            }
        }
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PresenceRegistry {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}
