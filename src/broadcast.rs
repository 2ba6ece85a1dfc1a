//! Session registry and fan-out broadcaster
//!
//! Sessions are held behind one lock, but the lock is never held across a
//! socket write: each session owns an unbounded channel drained by its
//! connection's writer task. A send to a departed session fails on the
//! closed channel and is simply skipped, so deregistration can interleave
//! with an in-flight broadcast.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::messages::ServerMessage;
use crate::poll::Poll;

/// Handle naming one live connection.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SessionId(u64);

#[derive(Debug)]
struct SessionHandle {
    client_id: String,
    tx: mpsc::UnboundedSender<ServerMessage>,
}

#[derive(Debug, Default)]
pub struct Broadcaster {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, SessionHandle>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session and immediately push an `init` message so a newly
    /// joined client is never left without state.
    pub fn register(
        &self,
        client_id: &str,
        tx: mpsc::UnboundedSender<ServerMessage>,
        snapshot: Poll,
    ) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let _ = tx.send(ServerMessage::Init { poll: snapshot });
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.insert(
            id,
            SessionHandle {
                client_id: client_id.to_string(),
                tx,
            },
        );
        debug!(client_id, session = id, "session registered");
        SessionId(id)
    }

    pub fn deregister(&self, session_id: SessionId) {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = sessions.remove(&session_id.0) {
            debug!(client_id = handle.client_id, session = session_id.0, "session deregistered");
        }
    }

    /// Push a message to every registered session. Failures to individual
    /// sessions (closed channels) are ignored and never block the rest.
    pub fn broadcast(&self, msg: ServerMessage) {
        let senders: Vec<mpsc::UnboundedSender<ServerMessage>> = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.values().map(|h| h.tx.clone()).collect()
        };
        for tx in senders {
            let _ = tx.send(msg.clone());
        }
    }

    /// Push a message to a single session, e.g. a rejection to the requester.
    pub fn send_to(&self, session_id: SessionId, msg: ServerMessage) {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = sessions.get(&session_id.0) {
            let _ = handle.tx.send(msg);
        }
    }

    pub fn session_count(&self) -> usize {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollOption;

    fn snapshot() -> Poll {
        Poll {
            id: "poll-1".to_string(),
            question: "q".to_string(),
            options: vec![PollOption::new("1", "JavaScript")],
        }
    }

    #[tokio::test]
    async fn register_sends_init_immediately() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        broadcaster.register("127.0.0.1:1000", tx, snapshot());
        let msg = rx.recv().await.unwrap();
        assert!(matches!(msg, ServerMessage::Init { .. }));
    }

    #[tokio::test]
    async fn broadcast_reaches_all_sessions() {
        let broadcaster = Broadcaster::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        broadcaster.register("a", tx_a, snapshot());
        broadcaster.register("b", tx_b, snapshot());
        assert_eq!(broadcaster.session_count(), 2);

        let mut updated = snapshot();
        updated.options[0].votes = 7;
        broadcaster.broadcast(ServerMessage::Update { poll: updated });

        // both receive init then the identical update
        for rx in [&mut rx_a, &mut rx_b] {
            assert!(matches!(rx.recv().await.unwrap(), ServerMessage::Init { .. }));
            match rx.recv().await.unwrap() {
                ServerMessage::Update { poll } => assert_eq!(poll.options[0].votes, 7),
                other => panic!("expected update, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn departed_session_is_skipped_not_fatal() {
        let broadcaster = Broadcaster::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        broadcaster.register("a", tx_a, snapshot());
        let session_b = broadcaster.register("b", tx_b, snapshot());

        // b's receiver is gone before the broadcast
        drop(rx_b);
        broadcaster.broadcast(ServerMessage::Update { poll: snapshot() });
        broadcaster.deregister(session_b);

        assert!(matches!(rx_a.recv().await.unwrap(), ServerMessage::Init { .. }));
        assert!(matches!(
            rx_a.recv().await.unwrap(),
            ServerMessage::Update { .. }
        ));
        assert_eq!(broadcaster.session_count(), 1);
    }

    #[tokio::test]
    async fn send_to_targets_one_session() {
        let broadcaster = Broadcaster::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let session_a = broadcaster.register("a", tx_a, snapshot());
        broadcaster.register("b", tx_b, snapshot());

        broadcaster.send_to(
            session_a,
            ServerMessage::Error {
                message: "no".to_string(),
                anomaly_details: None,
            },
        );

        assert!(matches!(rx_a.recv().await.unwrap(), ServerMessage::Init { .. }));
        assert!(matches!(rx_a.recv().await.unwrap(), ServerMessage::Error { .. }));
        // b only ever saw its init
        assert!(matches!(rx_b.recv().await.unwrap(), ServerMessage::Init { .. }));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn deregister_then_broadcast_is_a_noop_for_that_session() {
        let broadcaster = Broadcaster::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let session = broadcaster.register("a", tx, snapshot());
        assert!(matches!(rx.recv().await.unwrap(), ServerMessage::Init { .. }));

        broadcaster.deregister(session);
        broadcaster.broadcast(ServerMessage::Update { poll: snapshot() });
        assert!(rx.try_recv().is_err());
        assert_eq!(broadcaster.session_count(), 0);
    }
}
