//! Relay chat history

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{info, warn};

use chat_protocol::Envelope;

use super::write_snapshot;

/// Append-only log of every CHAT envelope the relay has seen, stored
/// exactly as received — ciphertext or plaintext, never decrypted.
pub struct HistoryStore {
    path: PathBuf,
    log: Mutex<Vec<Envelope>>,
}

impl HistoryStore {
    /// Open the store at `path`, loading any existing snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let log = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<Envelope>>(&bytes) {
                Ok(log) => {
                    info!(count = log.len(), "history entries loaded");
                    log
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "history snapshot unreadable, starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self {
            path,
            log: Mutex::new(log),
        }
    }

    /// Append one envelope and persist the snapshot.
    pub fn append(&self, envelope: Envelope) {
        let mut log = self.log.lock();
        log.push(envelope);
        if let Err(e) = write_snapshot(&self.path, &*log) {
            warn!(error = %e, "persisting history failed; memory stays authoritative");
        }
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Ordered copy of the log.
    pub fn snapshot(&self) -> Vec<Envelope> {
        self.log.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use chat_protocol::EnvelopeKind;

    use super::*;

    #[test]
    fn appends_preserve_order_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let store = HistoryStore::open(&path);
        for i in 0..3 {
            store.append(Envelope::new(
                EnvelopeKind::Chat,
                "alice",
                "bob",
                format!("msg-{i}"),
                "2025-11-19T20:30:15",
            ));
        }
        assert_eq!(store.len(), 3);

        let reopened = HistoryStore::open(&path);
        let bodies: Vec<String> = reopened
            .snapshot()
            .into_iter()
            .map(|env| env.body)
            .collect();
        assert_eq!(bodies, ["msg-0", "msg-1", "msg-2"]);
    }
}
