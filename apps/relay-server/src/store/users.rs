//! User directory

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::write_snapshot;

/// One registered account.
///
/// The password is compared in cleartext and the public key is the base64
/// wire form; both survive restarts. Hashing the credential would harden
/// the directory but is not part of the relay's contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub password: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// id → account record, snapshotted to one JSON file.
pub struct UserStore {
    path: PathBuf,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl UserStore {
    /// Open the store at `path`, loading any existing snapshot. A missing
    /// file starts empty; an unreadable one is logged and starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, UserRecord>>(&bytes) {
                Ok(map) => {
                    info!(count = map.len(), "user records loaded");
                    map
                }
                Err(e) => {
                    warn!(error = %e, path = %path.display(), "user snapshot unreadable, starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            users: Mutex::new(users),
        }
    }

    pub fn exists(&self, id: &str) -> bool {
        self.users.lock().contains_key(id)
    }

    pub fn check_password(&self, id: &str, password: &str) -> bool {
        self.users
            .lock()
            .get(id)
            .is_some_and(|record| record.password == password)
    }

    pub fn public_key(&self, id: &str) -> Option<String> {
        self.users.lock().get(id).map(|record| record.public_key.clone())
    }

    /// Insert and persist a new account. The whole load-mutate-persist
    /// cycle runs under one lock, so concurrent signups serialize.
    pub fn add_user(&self, id: &str, password: &str, public_key: &str) {
        let mut users = self.users.lock();
        users.insert(
            id.to_string(),
            UserRecord {
                id: id.to_string(),
                password: password.to_string(),
                public_key: public_key.to_string(),
            },
        );
        if let Err(e) = write_snapshot(&self.path, &*users) {
            warn!(error = %e, "persisting user store failed; memory stays authoritative");
        }
    }
}
