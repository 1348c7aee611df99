//! Thread-safe WebSocket session set shared by handler code and the
//! background pollers (§5).

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Holds one outbound channel per connected WebSocket session.
///
/// Each session's own send queue serialises its writes; sends across
/// different sessions proceed independently, so a broadcast never blocks on
/// a single slow client.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    sessions: DashMap<Uuid, UnboundedSender<Message>>,
}

impl ConnectionManager {
    /// Build an empty connection set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted session, returning its id and the
    /// receiving half of its send queue. The caller is responsible for
    /// forwarding messages from the receiver onto the actual socket.
    #[must_use]
    pub fn connect(&self) -> (Uuid, tokio::sync::mpsc::UnboundedReceiver<Message>) {
        let id = Uuid::new_v4();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.sessions.insert(id, tx);
        (id, rx)
    }

    /// Remove a session. Idempotent: removing an id twice (or one that was
    /// never present) is a no-op.
    pub fn disconnect(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Serialise `event` once and send it to every connected session,
    /// dropping (and de-registering) any session whose queue has been
    /// closed by a disconnected client.
    pub async fn broadcast(&self, event: impl Serialize) {
        let Ok(payload) = serde_json::to_string(&event) else {
            tracing::warn!("dropped a broadcast event that failed to serialise");
            return;
        };
        self.send_text(payload);
    }

    /// Send a single session its initial snapshot frames. Used only by the
    /// WebSocket connect handler, never by `broadcast`.
    pub fn send_to(&self, id: Uuid, event: impl Serialize) {
        let Ok(payload) = serde_json::to_string(&event) else {
            return;
        };
        if let Some(sender) = self.sessions.get(&id) {
            let _ = sender.send(Message::Text(payload.into()));
        }
    }

    fn send_text(&self, payload: String) {
        let mut dead = Vec::new();
        for entry in &self.sessions {
            if entry.value().send(Message::Text(payload.clone().into())).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.sessions.remove(&id);
        }
    }

    /// Current number of connected sessions, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether there are no connected sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

pub type Shared = Arc<ConnectionManager>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn broadcast_reaches_every_connected_session() {
        let manager = ConnectionManager::new();
        let (id_a, mut rx_a) = manager.connect();
        let (id_b, mut rx_b) = manager.connect();

        manager.broadcast(json!({"type": "x"})).await;

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
        assert_eq!(manager.len(), 2);

        manager.disconnect(id_a);
        manager.disconnect(id_b);
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn broadcast_drops_sessions_whose_receiver_was_dropped() {
        let manager = ConnectionManager::new();
        let (_id, rx) = manager.connect();
        drop(rx);

        manager.broadcast(json!({"type": "x"})).await;
        assert!(manager.is_empty());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let manager = ConnectionManager::new();
        let (id, _rx) = manager.connect();
        manager.disconnect(id);
        manager.disconnect(id);
        assert!(manager.is_empty());
    }
}
