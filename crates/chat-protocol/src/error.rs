//! Error types for the wire protocol

use thiserror::Error;

/// Wire protocol error
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] serde_json::Error),

    #[error("malformed cipher record: {0}")]
    MalformedRecord(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
