//! Crypto Session — End-to-End Encryption for Haven
//!
//! X25519 identity-key agreement, HKDF-SHA256 session-key derivation and
//! AES-256-GCM message encryption. The relay never holds any of this
//! material; everything in this crate runs client-side.

mod error;
mod identity;
mod session;

pub use error::*;
pub use identity::*;
pub use session::*;

/// Nonce size for AES-256-GCM (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;

/// Public key size (256 bits / 32 bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// Derived session key size (256 bits / 32 bytes)
pub const SESSION_KEY_SIZE: usize = 32;

/// HKDF application info string. Both peers must expand with the same
/// bytes or their derived keys will not match.
pub const SESSION_INFO: &[u8] = b"E2EE-Chat-AES-GCM";
