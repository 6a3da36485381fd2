//! Crypto session error types

use chat_protocol::ProtocolError;
use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed or invalid-curve public-key material
    #[error("invalid public key: {0}")]
    KeyFormat(String),

    /// AEAD tag verification failed; no plaintext was produced
    #[error("decryption failed: authentication tag mismatch")]
    Authentication,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Malformed wire record, distinct from a failed tag check
    #[error(transparent)]
    Format(#[from] ProtocolError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
