//! In-process delivery registry for connected chat clients.
//!
//! Each connection that has announced its identity holds one entry under that
//! identity; an identity may have several live connections (multiple devices).
//! Delivery is best-effort: events to identities with no live handles are
//! dropped, and the persisted message is the only durable record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

use crate::chat::dto::ServerEvent;

/// Identifies one live connection within the hub, so it can leave later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnId(u64);

#[derive(Default)]
pub struct ChatHub {
    next_conn: AtomicU64,
    channels: Mutex<HashMap<Uuid, Vec<(ConnId, UnboundedSender<ServerEvent>)>>>,
}

impl ChatHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a delivery handle under `user_id`.
    pub fn join(&self, user_id: Uuid, tx: UnboundedSender<ServerEvent>) -> ConnId {
        let conn = ConnId(self.next_conn.fetch_add(1, Ordering::Relaxed));
        let mut channels = self.channels.lock().expect("hub lock poisoned");
        channels.entry(user_id).or_default().push((conn, tx));
        debug!(%user_id, conn = conn.0, "chat hub join");
        conn
    }

    /// Remove one connection's handle; the identity's entry disappears with
    /// its last connection.
    pub fn leave(&self, user_id: Uuid, conn: ConnId) {
        let mut channels = self.channels.lock().expect("hub lock poisoned");
        if let Some(handles) = channels.get_mut(&user_id) {
            handles.retain(|(id, _)| *id != conn);
            if handles.is_empty() {
                channels.remove(&user_id);
            }
        }
        debug!(%user_id, conn = conn.0, "chat hub leave");
    }

    /// Deliver an event to every live connection of `user_id`, pruning handles
    /// whose receiving task is gone. Returns how many handles were reached.
    pub fn send_to(&self, user_id: Uuid, event: ServerEvent) -> usize {
        let mut channels = self.channels.lock().expect("hub lock poisoned");
        let Some(handles) = channels.get_mut(&user_id) else {
            return 0;
        };
        handles.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        let reached = handles.len();
        if handles.is_empty() {
            channels.remove(&user_id);
        }
        reached
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.channels
            .lock()
            .expect("hub lock poisoned")
            .get(&user_id)
            .map(|h| h.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn ping() -> ServerEvent {
        ServerEvent::ErrorMessage {
            message: "ping".into(),
        }
    }

    #[tokio::test]
    async fn delivers_to_all_connections_of_an_identity() {
        let hub = ChatHub::new();
        let user = Uuid::new_v4();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        hub.join(user, tx1);
        hub.join(user, tx2);

        assert_eq!(hub.send_to(user, ping()), 2);
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn absent_receiver_is_a_noop() {
        let hub = ChatHub::new();
        assert_eq!(hub.send_to(Uuid::new_v4(), ping()), 0);
    }

    #[tokio::test]
    async fn leave_stops_delivery() {
        let hub = ChatHub::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = unbounded_channel();
        let conn = hub.join(user, tx);
        hub.leave(user, conn);

        assert_eq!(hub.send_to(user, ping()), 0);
        assert_eq!(hub.connection_count(user), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_handles_are_pruned_on_send() {
        let hub = ChatHub::new();
        let user = Uuid::new_v4();
        let (tx_dead, rx_dead) = unbounded_channel();
        let (tx_live, mut rx_live) = unbounded_channel();
        hub.join(user, tx_dead);
        hub.join(user, tx_live);
        drop(rx_dead);

        assert_eq!(hub.send_to(user, ping()), 1);
        assert_eq!(hub.connection_count(user), 1);
        assert!(rx_live.recv().await.is_some());
    }

    #[tokio::test]
    async fn identities_are_isolated() {
        let hub = ChatHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        hub.join(a, tx_a);
        hub.join(b, tx_b);

        hub.send_to(a, ping());
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }
}
