//! Live connection registry

use chat_protocol::Envelope;
use dashmap::DashMap;
use tokio::sync::mpsc;

/// Capacity of each connection's outbound queue.
pub const OUTBOUND_QUEUE: usize = 100;

/// Handle used to queue envelopes onto one connection's writer task.
pub type OutboundSender = mpsc::Sender<Envelope>;

/// user id → live outbound channel.
///
/// Every envelope received on a connection rebinds its sender id here, so
/// the map churns per message rather than per connect/disconnect. The
/// last writer wins and entries are never removed on disconnect; a stale
/// entry just turns the next forward into a best-effort drop.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: DashMap<String, OutboundSender>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Bind `user_id` to a connection's outbound queue, clobbering any
    /// previous binding for that id.
    pub fn bind(&self, user_id: &str, sender: OutboundSender) {
        self.inner.insert(user_id.to_string(), sender);
    }

    pub fn sender_for(&self, user_id: &str) -> Option<OutboundSender> {
        self.inner.get(user_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every registered channel, for broadcast. Senders are
    /// cloned out so no map shard lock is held across sends.
    pub fn all_senders(&self) -> Vec<OutboundSender> {
        self.inner
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_binding_for_an_id_wins() {
        let registry = ConnectionRegistry::new();
        let (first_tx, mut first_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (second_tx, mut second_rx) = mpsc::channel(OUTBOUND_QUEUE);

        registry.bind("alice", first_tx);
        registry.bind("alice", second_tx);
        assert_eq!(registry.len(), 1);

        let env = Envelope::system("alice", "ping", "");
        registry
            .sender_for("alice")
            .unwrap()
            .send(env.clone())
            .await
            .unwrap();

        assert!(first_rx.try_recv().is_err());
        assert_eq!(second_rx.try_recv().unwrap(), env);
    }

    #[test]
    fn unknown_id_has_no_sender() {
        let registry = ConnectionRegistry::new();
        assert!(registry.sender_for("nobody").is_none());
        assert!(registry.is_empty());
    }
}
