//! Long-term identity keys

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::{CryptoError, CryptoResult, PUBLIC_KEY_SIZE};

/// Long-term X25519 key pair identifying one user.
///
/// Created once at first signup and reloaded thereafter. The secret half
/// never leaves the owning process except through the client's
/// passphrase-protected vault.
pub struct IdentityKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl IdentityKeyPair {
    /// Generate a fresh identity from OS entropy.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild an identity from a stored 32-byte secret scalar.
    pub fn from_secret_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Raw secret scalar, for vault persistence only.
    pub fn secret_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.secret.to_bytes()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Public key in the wire encoding (base64 of the raw point).
    pub fn public_base64(&self) -> String {
        encode_public_key(&self.public)
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }
}

// No Clone/Debug on IdentityKeyPair: the scalar must not leak through
// derived formatting.

/// Encode a public key for the wire.
pub fn encode_public_key(key: &PublicKey) -> String {
    BASE64.encode(key.as_bytes())
}

/// Decode a wire public key, rejecting malformed material.
pub fn decode_public_key(encoded: &str) -> CryptoResult<PublicKey> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|e| CryptoError::KeyFormat(format!("not valid base64: {e}")))?;
    let bytes: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
        CryptoError::KeyFormat(format!("expected {PUBLIC_KEY_SIZE} bytes, got {}", v.len()))
    })?;
    Ok(PublicKey::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_key_round_trips_through_wire_encoding() {
        let identity = IdentityKeyPair::generate();
        let decoded = decode_public_key(&identity.public_base64()).unwrap();
        assert_eq!(decoded.as_bytes(), identity.public_key().as_bytes());
    }

    #[test]
    fn secret_bytes_rebuild_the_same_identity() {
        let identity = IdentityKeyPair::generate();
        let reloaded = IdentityKeyPair::from_secret_bytes(identity.secret_bytes());
        assert_eq!(reloaded.public_base64(), identity.public_base64());
    }

    #[test]
    fn garbage_base64_is_rejected() {
        assert!(matches!(
            decode_public_key("%%%not-base64%%%"),
            Err(CryptoError::KeyFormat(_))
        ));
    }

    #[test]
    fn wrong_length_key_is_rejected() {
        let short = BASE64.encode([1u8; 16]);
        assert!(matches!(
            decode_public_key(&short),
            Err(CryptoError::KeyFormat(_))
        ));
    }
}
