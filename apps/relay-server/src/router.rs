//! Envelope dispatch

use tracing::{debug, info, warn};

use chat_protocol::{AuthPayload, Envelope, EnvelopeKind, auth_result};

use crate::registry::{ConnectionRegistry, OutboundSender};
use crate::store::{HistoryStore, UserStore};

/// Dispatches envelopes by kind: authentication, key-exchange relay and
/// chat forwarding. Owns the process-lifetime shared state, created at
/// server start and injected into every connection handler.
pub struct RelayRouter {
    registry: ConnectionRegistry,
    users: UserStore,
    history: HistoryStore,
}

impl RelayRouter {
    pub fn new(users: UserStore, history: HistoryStore) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            users,
            history,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Handle one parsed envelope. `reply` is the receiving connection's
    /// own outbound queue.
    pub async fn dispatch(&self, envelope: Envelope, reply: &OutboundSender) {
        match envelope.kind {
            EnvelopeKind::AuthSignup => self.handle_signup(envelope, reply).await,
            EnvelopeKind::AuthLogin => self.handle_login(envelope, reply).await,
            EnvelopeKind::KeyReq => self.handle_key_request(envelope).await,
            EnvelopeKind::Chat => self.handle_chat(envelope, reply).await,
            EnvelopeKind::KeyRes | EnvelopeKind::System | EnvelopeKind::AuthResult => {
                warn!(kind = ?envelope.kind, sender = %envelope.sender, "ignoring relay-originated kind from a client");
            }
        }
    }

    async fn handle_signup(&self, envelope: Envelope, reply: &OutboundSender) {
        let payload = AuthPayload::from_body(&envelope.body).unwrap_or_default();
        let verdict = match (payload.id, payload.password, payload.public_key) {
            (Some(id), Some(password), Some(public_key)) => {
                if self.users.exists(&id) {
                    auth_result::SIGNUP_ID_EXISTS
                } else {
                    self.users.add_user(&id, &password, &public_key);
                    info!(user = %id, "account created");
                    auth_result::SIGNUP_OK
                }
            }
            _ => auth_result::SIGNUP_BAD_PAYLOAD,
        };
        let _ = reply
            .send(Envelope::auth_result(
                &envelope.sender,
                verdict,
                &envelope.timestamp,
            ))
            .await;
    }

    async fn handle_login(&self, envelope: Envelope, reply: &OutboundSender) {
        let payload = AuthPayload::from_body(&envelope.body).unwrap_or_default();
        let id = payload.id.unwrap_or_default();
        let password = payload.password.unwrap_or_default();

        let verdict = if !self.users.exists(&id) {
            auth_result::LOGIN_ID_NOT_FOUND
        } else if !self.users.check_password(&id, &password) {
            auth_result::LOGIN_BAD_PASSWORD
        } else {
            info!(user = %id, "login accepted");
            auth_result::LOGIN_OK
        };
        let _ = reply
            .send(Envelope::auth_result(
                &envelope.sender,
                verdict,
                &envelope.timestamp,
            ))
            .await;
    }

    /// Relay each side's public key to the other. The requester's key
    /// rides in the request body; the target's comes from the directory.
    /// The shared secret itself is only ever derived client-side.
    async fn handle_key_request(&self, envelope: Envelope) {
        let requester = &envelope.sender;
        let target = &envelope.receiver;

        let Some(target_key) = self.users.public_key(target) else {
            if let Some(out) = self.registry.sender_for(requester) {
                let notice = Envelope::system(
                    requester,
                    format!("NO_SUCH_USER:{target}"),
                    &envelope.timestamp,
                );
                let _ = out.send(notice).await;
            }
            return;
        };

        // The requester gets a KEY_RES authored as if the target had
        // answered directly.
        if let Some(out) = self.registry.sender_for(requester) {
            let res = Envelope::new(
                EnvelopeKind::KeyRes,
                target,
                requester,
                target_key,
                &envelope.timestamp,
            );
            let _ = out.send(res).await;
            debug!(from = %target, to = %requester, "stored public key relayed");
        }

        // The target gets the original request with the requester's key.
        if let Some(out) = self.registry.sender_for(target) {
            let req = Envelope::new(
                EnvelopeKind::KeyReq,
                requester,
                target,
                &envelope.body,
                &envelope.timestamp,
            );
            let _ = out.send(req).await;
            debug!(from = %requester, to = %target, "requester public key forwarded");
        }
    }

    /// Forward an opaque chat body. The envelope is persisted first,
    /// always; delivery is at-most-once and best-effort.
    async fn handle_chat(&self, envelope: Envelope, reply: &OutboundSender) {
        self.history.append(envelope.clone());

        if envelope.is_broadcast() {
            for out in self.registry.all_senders() {
                let _ = out.send(envelope.clone()).await;
            }
            return;
        }

        match self.registry.sender_for(&envelope.receiver) {
            Some(out) => {
                let _ = out.send(envelope).await;
            }
            None => {
                let notice = Envelope::system(
                    &envelope.sender,
                    format!("TARGET_OFFLINE:{}", envelope.receiver),
                    &envelope.timestamp,
                );
                let _ = reply.send(notice).await;
            }
        }
    }
}
