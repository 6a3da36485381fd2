//! Routed protocol messages

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::{BROADCAST_RECEIVER, ProtocolError, SERVER_ID, TIMESTAMP_FORMAT};

/// Kind of envelope being routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeKind {
    /// Chat payload, opaque to the relay (cipher record or plaintext)
    Chat,
    /// Public-key request; body carries the requester's public key
    KeyReq,
    /// Public-key response; body carries the target's public key
    KeyRes,
    /// Relay-originated status notice
    System,
    /// Account creation; body is an [`AuthPayload`]
    AuthSignup,
    /// Login; body is an [`AuthPayload`] without a public key
    AuthLogin,
    /// Relay verdict on a signup/login attempt
    AuthResult,
}

/// One routed protocol message. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    pub sender: String,
    pub receiver: String,
    pub body: String,
    pub timestamp: String,
}

impl Envelope {
    pub fn new(
        kind: EnvelopeKind,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        body: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            sender: sender.into(),
            receiver: receiver.into(),
            body: body.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Relay-originated SYSTEM notice addressed to one user.
    pub fn system(receiver: &str, body: impl Into<String>, timestamp: &str) -> Self {
        Self::new(EnvelopeKind::System, SERVER_ID, receiver, body, timestamp)
    }

    /// Relay verdict on a signup/login attempt.
    pub fn auth_result(receiver: &str, verdict: &str, timestamp: &str) -> Self {
        Self::new(EnvelopeKind::AuthResult, SERVER_ID, receiver, verdict, timestamp)
    }

    /// Parse one newline-framed JSON envelope.
    pub fn from_line(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Encode for the wire. `serde_json` escapes control characters, so
    /// the output never contains a raw newline.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether the receiver is the broadcast token (case-insensitive).
    pub fn is_broadcast(&self) -> bool {
        self.receiver.eq_ignore_ascii_case(BROADCAST_RECEIVER)
    }
}

/// Current local time in the wire layout.
pub fn wire_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Body of AUTH_SIGNUP / AUTH_LOGIN envelopes.
///
/// Fields decode as `None` when absent so the relay can answer with the
/// precise failure marker instead of dropping the connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthPayload {
    pub id: Option<String>,
    pub password: Option<String>,
    #[serde(rename = "publicKey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl AuthPayload {
    pub fn signup(id: &str, password: &str, public_key: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            password: Some(password.to_string()),
            public_key: Some(public_key.to_string()),
        }
    }

    pub fn login(id: &str, password: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            password: Some(password.to_string()),
            public_key: None,
        }
    }

    pub fn to_body(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_body(body: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(body)?)
    }
}

/// AUTH_RESULT body markers.
pub mod auth_result {
    pub const SIGNUP_OK: &str = "SIGNUP_OK";
    pub const SIGNUP_BAD_PAYLOAD: &str = "SIGNUP_FAIL:BAD_PAYLOAD";
    pub const SIGNUP_ID_EXISTS: &str = "SIGNUP_FAIL:ID_EXISTS";
    pub const LOGIN_OK: &str = "LOGIN_OK";
    pub const LOGIN_ID_NOT_FOUND: &str = "LOGIN_FAIL:ID_NOT_FOUND";
    pub const LOGIN_BAD_PASSWORD: &str = "LOGIN_FAIL:BAD_PASSWORD";

    /// Clients treat any verdict containing this marker as success.
    pub const OK_MARKER: &str = "_OK";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_round_trips_through_wire_line() {
        let env = Envelope::new(
            EnvelopeKind::KeyReq,
            "alice",
            "bob",
            "a-public-key",
            "2025-11-19T20:30:15",
        );

        let line = env.to_line().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("\"type\":\"KEY_REQ\""));

        let parsed = Envelope::from_line(&line).unwrap();
        assert_eq!(parsed, env);
    }

    #[test]
    fn all_seven_kinds_use_wire_names() {
        let cases = [
            (EnvelopeKind::Chat, "\"CHAT\""),
            (EnvelopeKind::KeyReq, "\"KEY_REQ\""),
            (EnvelopeKind::KeyRes, "\"KEY_RES\""),
            (EnvelopeKind::System, "\"SYSTEM\""),
            (EnvelopeKind::AuthSignup, "\"AUTH_SIGNUP\""),
            (EnvelopeKind::AuthLogin, "\"AUTH_LOGIN\""),
            (EnvelopeKind::AuthResult, "\"AUTH_RESULT\""),
        ];
        for (kind, expected) in cases {
            assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
        }
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let line = r#"{"type":"GROUP_CHAT","sender":"a","receiver":"b","body":"","timestamp":""}"#;
        assert!(matches!(
            Envelope::from_line(line),
            Err(ProtocolError::InvalidEnvelope(_))
        ));
    }

    #[test]
    fn missing_field_is_rejected() {
        let line = r#"{"type":"CHAT","sender":"a","body":"hi","timestamp":""}"#;
        assert!(Envelope::from_line(line).is_err());
    }

    #[test]
    fn broadcast_token_is_case_insensitive() {
        for receiver in ["ALL", "all", "All"] {
            let env = Envelope::new(EnvelopeKind::Chat, "alice", receiver, "hi", "");
            assert!(env.is_broadcast());
        }
        let direct = Envelope::new(EnvelopeKind::Chat, "alice", "bob", "hi", "");
        assert!(!direct.is_broadcast());
    }

    #[test]
    fn auth_payload_tolerates_absent_fields() {
        let p = AuthPayload::from_body(r#"{"id":"alice"}"#).unwrap();
        assert_eq!(p.id.as_deref(), Some("alice"));
        assert!(p.password.is_none());
        assert!(p.public_key.is_none());
    }

    #[test]
    fn signup_payload_uses_wire_field_name() {
        let body = AuthPayload::signup("alice", "pw", "PKa").to_body().unwrap();
        assert!(body.contains("\"publicKey\":\"PKa\""));

        let login = AuthPayload::login("alice", "pw").to_body().unwrap();
        assert!(!login.contains("publicKey"));
    }

    #[test]
    fn wire_timestamp_matches_layout() {
        let ts = wire_timestamp();
        // 2025-11-19T20:30:15
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
    }
}
