//! Cipher record wire format
//!
//! An encrypted CHAT body travels as a single string:
//! `<algorithmId>:<nonceBase64>:<cipherTextAndTagBase64>`. The colon
//! separator occurs in neither the algorithm id nor the base64 alphabet,
//! so a bounded three-way split recovers the fields exactly.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Algorithm id stamped on every record this crate family produces.
pub const ALGORITHM_ID: &str = "AES-256-GCM";

const SEPARATOR: char = ':';

/// An AEAD ciphertext plus the metadata needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AeadRecord {
    pub algorithm: String,
    pub nonce_b64: String,
    pub cipher_b64: String,
}

impl AeadRecord {
    /// Build a record from a raw nonce and ciphertext‖tag bytes.
    pub fn from_parts(nonce: &[u8], cipher: &[u8]) -> Self {
        Self {
            algorithm: ALGORITHM_ID.to_string(),
            nonce_b64: BASE64.encode(nonce),
            cipher_b64: BASE64.encode(cipher),
        }
    }

    pub fn nonce_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        BASE64
            .decode(&self.nonce_b64)
            .map_err(|e| ProtocolError::MalformedRecord(format!("nonce is not valid base64: {e}")))
    }

    pub fn cipher_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        BASE64
            .decode(&self.cipher_b64)
            .map_err(|e| {
                ProtocolError::MalformedRecord(format!("ciphertext is not valid base64: {e}"))
            })
    }

    pub fn to_wire_string(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.algorithm, self.nonce_b64, self.cipher_b64
        )
    }

    pub fn from_wire_string(s: &str) -> Result<Self, ProtocolError> {
        let mut parts = s.splitn(3, SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(algorithm), Some(nonce_b64), Some(cipher_b64)) => Ok(Self {
                algorithm: algorithm.to_string(),
                nonce_b64: nonce_b64.to_string(),
                cipher_b64: cipher_b64.to_string(),
            }),
            _ => Err(ProtocolError::MalformedRecord(
                "expected 3 colon-separated fields".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_string_round_trips() {
        let record = AeadRecord::from_parts(&[7u8; 12], b"cipher-and-tag");
        let parsed = AeadRecord::from_wire_string(&record.to_wire_string()).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.algorithm, ALGORITHM_ID);
    }

    #[test]
    fn fewer_than_three_fields_is_malformed() {
        for s in ["", "AES-256-GCM", "AES-256-GCM:only-nonce"] {
            assert!(matches!(
                AeadRecord::from_wire_string(s),
                Err(ProtocolError::MalformedRecord(_))
            ));
        }
    }

    #[test]
    fn base64_padding_survives_the_split() {
        // '=' padding is part of base64 output and must not confuse the
        // bounded split.
        let record = AeadRecord::from_parts(&[0u8; 12], &[1u8; 17]);
        assert!(record.cipher_b64.ends_with('='));
        let parsed = AeadRecord::from_wire_string(&record.to_wire_string()).unwrap();
        assert_eq!(parsed.nonce_bytes().unwrap(), vec![0u8; 12]);
        assert_eq!(parsed.cipher_bytes().unwrap(), vec![1u8; 17]);
    }

    #[test]
    fn invalid_base64_fields_are_malformed() {
        let record = AeadRecord {
            algorithm: ALGORITHM_ID.to_string(),
            nonce_b64: "!!not-base64!!".to_string(),
            cipher_b64: "!!not-base64!!".to_string(),
        };
        assert!(record.nonce_bytes().is_err());
        assert!(record.cipher_bytes().is_err());
    }
}
