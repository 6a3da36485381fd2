//! Per-peer session map and the two inbound chat paths

use std::collections::HashMap;

use parking_lot::Mutex;

use chat_protocol::AeadRecord;
use crypto_session::{CryptoError, IdentityKeyPair, PeerSession};

/// What an inbound CHAT body resolved to.
///
/// The two decode paths are disjoint: a sender without a session is
/// plaintext and never touches the cipher, while a sender with a session
/// always goes through authenticated decryption.
#[derive(Debug, PartialEq, Eq)]
pub enum InboundChat {
    /// No session with the sender; the body is surfaced and stored as-is.
    Plaintext(String),
    /// Session decrypt succeeded.
    Decrypted(String),
    /// Session decrypt failed; nothing to display or store.
    Rejected,
}

/// Client-side session state shared by the inbound and outbound flows.
///
/// Map writes (key-exchange completion) and reads (send/decrypt) are
/// mutually exclusive behind one mutex.
pub struct SessionManager {
    identity: IdentityKeyPair,
    sessions: Mutex<HashMap<String, PeerSession>>,
    current_target: Mutex<Option<String>>,
}

impl SessionManager {
    pub fn new(identity: IdentityKeyPair) -> Self {
        Self {
            identity,
            sessions: Mutex::new(HashMap::new()),
            current_target: Mutex::new(None),
        }
    }

    pub fn identity(&self) -> &IdentityKeyPair {
        &self.identity
    }

    /// (Re)derive and store the session for `peer`. Overwriting is
    /// idempotent, so a repeated key exchange is harmless.
    pub fn establish(&self, peer: &str, public_b64: &str) -> Result<(), CryptoError> {
        let session = PeerSession::establish(&self.identity, peer, public_b64)?;
        self.sessions.lock().insert(peer.to_string(), session);
        Ok(())
    }

    pub fn has_session(&self, peer: &str) -> bool {
        self.sessions.lock().contains_key(peer)
    }

    /// Encrypt for `peer` if a session exists; `None` tells the caller to
    /// fall back to plaintext.
    pub fn encrypt_for(&self, peer: &str, plaintext: &str) -> Option<Result<String, CryptoError>> {
        let sessions = self.sessions.lock();
        let session = sessions.get(peer)?;
        Some(session.encrypt(plaintext).map(|record| record.to_wire_string()))
    }

    /// Resolve an inbound CHAT body from `sender` through exactly one of
    /// the two paths.
    pub fn resolve_inbound(&self, sender: &str, body: &str) -> InboundChat {
        let sessions = self.sessions.lock();
        let Some(session) = sessions.get(sender) else {
            return InboundChat::Plaintext(body.to_string());
        };

        let decrypted = AeadRecord::from_wire_string(body)
            .map_err(CryptoError::from)
            .and_then(|record| session.decrypt(&record));
        match decrypted {
            Ok(plaintext) => InboundChat::Decrypted(plaintext),
            Err(_) => InboundChat::Rejected,
        }
    }

    pub fn set_target(&self, peer: &str) {
        *self.current_target.lock() = Some(peer.to_string());
    }

    pub fn target(&self) -> Option<String> {
        self.current_target.lock().clone()
    }
}
