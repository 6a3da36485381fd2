//! Local chat history
//!
//! One JSON file per conversation under `<data_dir>/history`, named
//! `<me>__<peer>.json`. The load-append-rewrite cycle runs under a mutex
//! so the inbound and outbound flows cannot interleave a write. Failures
//! are logged; history is best-effort and never blocks messaging.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One displayed message, stored in the clear on the local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: String,
    pub receiver: String,
    pub message: String,
    pub timestamp: String,
}

/// Per-peer conversation files.
pub struct HistoryVault {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl HistoryVault {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_dir: data_dir.join("history"),
            write_lock: Mutex::new(()),
        }
    }

    fn file_of(&self, me: &str, peer: &str) -> PathBuf {
        self.base_dir.join(format!("{me}__{peer}.json"))
    }

    /// Stored conversation with `peer`, oldest first. Missing or
    /// unreadable files read as empty.
    pub fn load(&self, me: &str, peer: &str) -> Vec<HistoryEntry> {
        let _guard = self.write_lock.lock();
        self.read_entries(me, peer)
    }

    /// Append one entry, rewriting the conversation snapshot.
    pub fn append(&self, me: &str, peer: &str, entry: HistoryEntry) {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_entries(me, peer);
        entries.push(entry);
        if let Err(e) = self.write_entries(me, peer, &entries) {
            warn!(error = %e, peer, "persisting chat history failed");
        }
    }

    fn read_entries(&self, me: &str, peer: &str) -> Vec<HistoryEntry> {
        match fs::read(self.file_of(me, peer)) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, peer, "history file unreadable, treating as empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }

    fn write_entries(&self, me: &str, peer: &str, entries: &[HistoryEntry]) -> io::Result<()> {
        fs::create_dir_all(&self.base_dir)?;
        let path = self.file_of(me, peer);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries).map_err(io::Error::other)?)?;
        fs::rename(&tmp, path)
    }
}
