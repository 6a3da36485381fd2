//! Shared Wire Protocol for Haven
//!
//! This crate contains the envelope and cipher-record definitions shared
//! between the relay server and chat clients. One envelope travels per
//! UTF-8 line over a persistent TCP connection.

mod envelope;
mod error;
mod record;

pub use envelope::*;
pub use error::*;
pub use record::*;

/// Receiver token that addresses every registered connection.
pub const BROADCAST_RECEIVER: &str = "ALL";

/// Sender id the relay uses for envelopes it originates.
pub const SERVER_ID: &str = "server";

/// Timestamp layout used in every envelope (e.g. `2025-11-19T20:30:15`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
