//! Passphrase-protected identity vault
//!
//! Stores one X25519 key pair per user id under `<data_dir>/keystore`:
//! `<id>_public.key` holds the base64 public point in the clear, and
//! `<id>_private.key` holds `nonce ‖ AES-256-GCM(secret scalar)` under a
//! key stretched from the passphrase with PBKDF2-HMAC-SHA256.
//!
//! The PBKDF2 salt is a fixed constant, so equal passphrases stretch to
//! equal keys across users. A per-user random salt would be the hardened
//! variant; the fixed one is part of the vault's stated contract.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use tracing::info;

use crypto_session::{IdentityKeyPair, NONCE_SIZE, PUBLIC_KEY_SIZE};

const PBKDF2_ITERATIONS: u32 = 65_536;
const PBKDF2_SALT: &[u8] = b"haven-keystore-salt";

/// Identity vault failure
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("keystore i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("wrong passphrase or corrupted key file")]
    BadPassphrase,

    #[error("stored key material is malformed: {0}")]
    KeyFormat(String),
}

/// Local key store for long-term identity key pairs.
pub struct KeyVault {
    base_dir: PathBuf,
}

impl KeyVault {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            base_dir: data_dir.join("keystore"),
        }
    }

    fn public_file(&self, user_id: &str) -> PathBuf {
        self.base_dir.join(format!("{user_id}_public.key"))
    }

    fn private_file(&self, user_id: &str) -> PathBuf {
        self.base_dir.join(format!("{user_id}_private.key"))
    }

    pub fn exists(&self, user_id: &str) -> bool {
        self.public_file(user_id).exists() && self.private_file(user_id).exists()
    }

    /// Load the stored identity, or create and persist a fresh one on
    /// first use. Deterministic per (user id, passphrase): the same pair
    /// comes back on every call until the files are deleted.
    pub fn load_or_create(
        &self,
        user_id: &str,
        passphrase: &str,
    ) -> Result<IdentityKeyPair, VaultError> {
        if self.exists(user_id) {
            return self.load(user_id, passphrase);
        }

        let identity = IdentityKeyPair::generate();
        self.save(&identity, user_id, passphrase)?;
        info!(user = user_id, "new identity key pair created");
        Ok(identity)
    }

    fn save(
        &self,
        identity: &IdentityKeyPair,
        user_id: &str,
        passphrase: &str,
    ) -> Result<(), VaultError> {
        fs::create_dir_all(&self.base_dir)?;
        fs::write(self.public_file(user_id), identity.public_base64())?;

        let cipher = passphrase_cipher(passphrase)?;
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), identity.secret_bytes().as_slice())
            .map_err(|_| VaultError::KeyFormat("sealing the private key failed".to_string()))?;

        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&sealed);
        fs::write(self.private_file(user_id), blob)?;
        Ok(())
    }

    fn load(&self, user_id: &str, passphrase: &str) -> Result<IdentityKeyPair, VaultError> {
        let blob = fs::read(self.private_file(user_id))?;
        if blob.len() <= NONCE_SIZE {
            return Err(VaultError::KeyFormat(
                "private key file too short".to_string(),
            ));
        }
        let (nonce, sealed) = blob.split_at(NONCE_SIZE);

        let cipher = passphrase_cipher(passphrase)?;
        let secret = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| VaultError::BadPassphrase)?;
        let secret: [u8; PUBLIC_KEY_SIZE] = secret
            .try_into()
            .map_err(|_| VaultError::KeyFormat("unexpected secret scalar length".to_string()))?;

        Ok(IdentityKeyPair::from_secret_bytes(secret))
    }
}

fn passphrase_cipher(passphrase: &str) -> Result<Aes256Gcm, VaultError> {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(
        passphrase.as_bytes(),
        PBKDF2_SALT,
        PBKDF2_ITERATIONS,
        &mut key,
    );
    Aes256Gcm::new_from_slice(&key).map_err(|e| VaultError::KeyFormat(e.to_string()))
}
