//! Session-key derivation and authenticated encryption

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use tracing::debug;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use chat_protocol::{AeadRecord, ProtocolError};

use crate::{
    CryptoError, CryptoResult, IdentityKeyPair, NONCE_SIZE, SESSION_INFO, SESSION_KEY_SIZE,
    TAG_SIZE, decode_public_key,
};

/// Symmetric key shared by exactly one (local user, remote peer) pair.
///
/// Held only in memory and zeroized on drop. Recomputing it from the same
/// two long-term keys always yields the same bytes, so it is safe to lose
/// and rederive on demand.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

/// Derive the shared session key for one peer pair.
///
/// X25519 scalar multiplication followed by HKDF-SHA256 with an implicit
/// all-zero salt and the fixed application info string, expanded to 32
/// bytes. No per-session randomness is mixed in, so the function is pure
/// and symmetric: `derive(a.secret, b.public) == derive(b.secret,
/// a.public)` for all valid key pairs.
pub fn derive_session(
    my_secret: &StaticSecret,
    their_public: &PublicKey,
) -> CryptoResult<SessionKey> {
    let shared = my_secret.diffie_hellman(their_public);
    if !shared.was_contributory() {
        return Err(CryptoError::KeyFormat("low-order public key".to_string()));
    }

    let hkdf = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut key = [0u8; SESSION_KEY_SIZE];
    hkdf.expand(SESSION_INFO, &mut key)
        .map_err(|_| CryptoError::KeyDerivation("HKDF expansion failed".to_string()))?;

    Ok(SessionKey(key))
}

impl SessionKey {
    /// Encrypt a chat body into a wire record.
    ///
    /// The 12-byte nonce is sourced from the OS CSPRNG inside this call;
    /// callers cannot supply one, so nonce reuse under a key cannot
    /// happen by construction.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<AeadRecord> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;

        Ok(AeadRecord::from_parts(&nonce, &ciphertext))
    }

    /// Decrypt a wire record.
    ///
    /// Any tampering with nonce, ciphertext or tag, and any key mismatch,
    /// yields [`CryptoError::Authentication`] with no partial output.
    pub fn decrypt(&self, record: &AeadRecord) -> CryptoResult<String> {
        let nonce = record.nonce_bytes()?;
        if nonce.len() != NONCE_SIZE {
            return Err(ProtocolError::MalformedRecord(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                nonce.len()
            ))
            .into());
        }

        let cipher_bytes = record.cipher_bytes()?;
        if cipher_bytes.len() < TAG_SIZE {
            return Err(CryptoError::Authentication);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce), cipher_bytes.as_slice())
            .map_err(|_| CryptoError::Authentication)?;

        String::from_utf8(plaintext).map_err(|_| {
            ProtocolError::MalformedRecord("plaintext is not valid UTF-8".to_string()).into()
        })
    }
}

/// Client-side holder of one derived symmetric key for one remote peer.
pub struct PeerSession {
    peer_id: String,
    key: SessionKey,
}

impl PeerSession {
    /// Derive the session for `peer_id` from our identity and the peer's
    /// wire-encoded public key.
    ///
    /// Idempotent: re-establishing from the same keys yields an
    /// equivalent session, so overwriting an existing entry is safe.
    pub fn establish(
        identity: &IdentityKeyPair,
        peer_id: &str,
        their_public_b64: &str,
    ) -> CryptoResult<Self> {
        let their_public = decode_public_key(their_public_b64)?;
        let key = derive_session(identity.secret(), &their_public)?;
        debug!(peer = peer_id, "e2ee session established");
        Ok(Self {
            peer_id: peer_id.to_string(),
            key,
        })
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<AeadRecord> {
        self.key.encrypt(plaintext)
    }

    pub fn decrypt(&self, record: &AeadRecord) -> CryptoResult<String> {
        self.key.decrypt(record)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn keyed_pair() -> (IdentityKeyPair, IdentityKeyPair) {
        (IdentityKeyPair::generate(), IdentityKeyPair::generate())
    }

    #[test]
    fn derivation_is_symmetric() {
        let (alice, bob) = keyed_pair();

        let alice_key = derive_session(alice.secret(), bob.public_key()).unwrap();
        let bob_key = derive_session(bob.secret(), alice.public_key()).unwrap();

        // The keys never leave their wrappers; prove equality by crossing
        // an encrypted message between them.
        let record = alice_key.encrypt("shared secret check").unwrap();
        assert_eq!(bob_key.decrypt(&record).unwrap(), "shared secret check");
    }

    #[test]
    fn derivation_is_deterministic() {
        let (alice, bob) = keyed_pair();

        let first = derive_session(alice.secret(), bob.public_key()).unwrap();
        let second = derive_session(alice.secret(), bob.public_key()).unwrap();

        let record = first.encrypt("again").unwrap();
        assert_eq!(second.decrypt(&record).unwrap(), "again");
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let (alice, bob) = keyed_pair();
        let key = derive_session(alice.secret(), bob.public_key()).unwrap();

        for plaintext in ["hi", "", "안녕, E2EE!", "a longer message with spaces"] {
            let record = key.encrypt(plaintext).unwrap();
            assert_eq!(key.decrypt(&record).unwrap(), plaintext);
        }
    }

    #[test]
    fn low_order_public_key_is_rejected() {
        let alice = IdentityKeyPair::generate();
        let zero = PublicKey::from([0u8; 32]);
        assert!(matches!(
            derive_session(alice.secret(), &zero),
            Err(CryptoError::KeyFormat(_))
        ));
    }

    #[test]
    fn nonces_are_distinct_over_many_encryptions() {
        let (alice, bob) = keyed_pair();
        let key = derive_session(alice.secret(), bob.public_key()).unwrap();

        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let record = key.encrypt("same plaintext").unwrap();
            assert!(seen.insert(record.nonce_b64), "nonce reused under one key");
        }
    }

    #[test]
    fn single_byte_tamper_always_fails() {
        let (alice, bob) = keyed_pair();
        let key = derive_session(alice.secret(), bob.public_key()).unwrap();

        let record = key.encrypt("integrity matters").unwrap();
        let nonce = record.nonce_bytes().unwrap();
        let cipher = record.cipher_bytes().unwrap();

        // Nonce, ciphertext body and tag each flip one byte in turn.
        let mut bad_nonce = nonce.clone();
        bad_nonce[0] ^= 0x01;
        let tampered = AeadRecord::from_parts(&bad_nonce, &cipher);
        assert!(matches!(
            key.decrypt(&tampered),
            Err(CryptoError::Authentication)
        ));

        let mut bad_body = cipher.clone();
        bad_body[0] ^= 0x01;
        let tampered = AeadRecord::from_parts(&nonce, &bad_body);
        assert!(matches!(
            key.decrypt(&tampered),
            Err(CryptoError::Authentication)
        ));

        let mut bad_tag = cipher.clone();
        *bad_tag.last_mut().unwrap() ^= 0x01;
        let tampered = AeadRecord::from_parts(&nonce, &bad_tag);
        assert!(matches!(
            key.decrypt(&tampered),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn truncated_ciphertext_fails_closed() {
        let (alice, bob) = keyed_pair();
        let key = derive_session(alice.secret(), bob.public_key()).unwrap();

        let record = key.encrypt("short").unwrap();
        let cipher = record.cipher_bytes().unwrap();
        let truncated = AeadRecord::from_parts(&record.nonce_bytes().unwrap(), &cipher[..8]);
        assert!(matches!(
            key.decrypt(&truncated),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn wrong_key_fails_authentication() {
        let (alice, bob) = keyed_pair();
        let mallory = IdentityKeyPair::generate();

        let good = derive_session(alice.secret(), bob.public_key()).unwrap();
        let wrong = derive_session(mallory.secret(), bob.public_key()).unwrap();

        let record = good.encrypt("not for mallory").unwrap();
        assert!(matches!(
            wrong.decrypt(&record),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn peer_sessions_interoperate_from_wire_keys() {
        let (alice, bob) = keyed_pair();

        let alice_side =
            PeerSession::establish(&alice, "bob", &bob.public_base64()).unwrap();
        let bob_side =
            PeerSession::establish(&bob, "alice", &alice.public_base64()).unwrap();

        let record = alice_side.encrypt("hi").unwrap();
        assert_eq!(bob_side.decrypt(&record).unwrap(), "hi");
        assert_eq!(alice_side.peer_id(), "bob");
    }

    #[test]
    fn establish_rejects_malformed_wire_key() {
        let alice = IdentityKeyPair::generate();
        assert!(matches!(
            PeerSession::establish(&alice, "bob", "not-a-key"),
            Err(CryptoError::KeyFormat(_))
        ));
    }

    #[test]
    fn malformed_record_is_a_format_error_not_authentication() {
        let (alice, bob) = keyed_pair();
        let key = derive_session(alice.secret(), bob.public_key()).unwrap();

        let record = AeadRecord {
            algorithm: "AES-256-GCM".to_string(),
            nonce_b64: "!!!".to_string(),
            cipher_b64: "!!!".to_string(),
        };
        assert!(matches!(key.decrypt(&record), Err(CryptoError::Format(_))));
    }
}
