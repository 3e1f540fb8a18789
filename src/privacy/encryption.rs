//! Encryption Service
//!
//! AES-256-GCM authenticated encryption for classified fields. The master
//! key is loaded from a restricted-permission key file at process start,
//! generated once if absent, and never regenerated mid-process (rotation
//! is redeploy-only). All failures surface as `EncryptionFailure` with no
//! inner detail: the gateway fails closed rather than storing plaintext.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::privacy::audit::ClassificationLevel;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// AES-256-GCM cipher bound to the process master key
pub struct EncryptionService {
    cipher: Aes256Gcm,
}

impl EncryptionService {
    /// Build from raw key material
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte key");
        Self { cipher }
    }

    /// Service with a random, non-persisted key (tests, development).
    /// Nothing encrypted with it outlives the process.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self::from_key(key)
    }

    /// Load the master key from `path`, generating and persisting it with
    /// owner-only permissions on first start.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        let key = if path.exists() {
            let bytes = std::fs::read(path)?;
            let key: [u8; KEY_LEN] = bytes
                .as_slice()
                .try_into()
                .map_err(|_| AppError::Config(format!("bad key file length: {:?}", path)))?;
            debug!(?path, "master encryption key loaded");
            key
        } else {
            let mut key = [0u8; KEY_LEN];
            OsRng.fill_bytes(&mut key);
            std::fs::write(path, key)?;
            restrict_permissions(path)?;
            info!(?path, "master encryption key generated");
            key
        };

        Ok(Self::from_key(key))
    }

    /// Encrypt plaintext under a random nonce; output is
    /// base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &[u8], classification: ClassificationLevel) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| AppError::EncryptionFailure)?;

        debug!(%classification, bytes = plaintext.len(), "field encrypted");

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    /// Decrypt and authenticate a value produced by `encrypt`
    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|_| AppError::EncryptionFailure)?;
        if raw.len() <= NONCE_LEN {
            return Err(AppError::EncryptionFailure);
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AppError::EncryptionFailure)
    }

    /// String convenience wrappers
    pub fn encrypt_str(&self, plaintext: &str, classification: ClassificationLevel) -> Result<String> {
        self.encrypt(plaintext.as_bytes(), classification)
    }

    pub fn decrypt_str(&self, encoded: &str) -> Result<String> {
        let bytes = self.decrypt(encoded)?;
        String::from_utf8(bytes).map_err(|_| AppError::EncryptionFailure)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let service = EncryptionService::ephemeral();
        let ct = service
            .encrypt_str("fever, fatigue", ClassificationLevel::Restricted)
            .unwrap();

        assert_ne!(ct, "fever, fatigue");
        assert_eq!(service.decrypt_str(&ct).unwrap(), "fever, fatigue");
    }

    #[test]
    fn test_nonces_differ_per_operation() {
        let service = EncryptionService::ephemeral();
        let a = service
            .encrypt_str("same input", ClassificationLevel::Confidential)
            .unwrap();
        let b = service
            .encrypt_str("same input", ClassificationLevel::Confidential)
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_tampered_ciphertext_fails_closed() {
        let service = EncryptionService::ephemeral();
        let ct = service
            .encrypt_str("payload", ClassificationLevel::Restricted)
            .unwrap();

        let mut raw = BASE64.decode(&ct).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = BASE64.encode(raw);

        assert!(matches!(
            service.decrypt(&tampered),
            Err(AppError::EncryptionFailure)
        ));
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let a = EncryptionService::ephemeral();
        let b = EncryptionService::ephemeral();
        let ct = a
            .encrypt_str("payload", ClassificationLevel::Restricted)
            .unwrap();

        assert!(matches!(b.decrypt(&ct), Err(AppError::EncryptionFailure)));
    }

    #[test]
    fn test_garbage_input_fails_closed() {
        let service = EncryptionService::ephemeral();
        assert!(service.decrypt("!!not-base64!!").is_err());
        assert!(service.decrypt("c2hvcnQ=").is_err());
    }

    #[test]
    fn test_key_file_round_trip() {
        let dir = std::env::temp_dir().join(format!("medgate-key-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let key_path = dir.join("master.key");

        let first = EncryptionService::load_or_generate(&key_path).unwrap();
        let ct = first
            .encrypt_str("persisted", ClassificationLevel::Restricted)
            .unwrap();

        // Second load reuses the same key material
        let second = EncryptionService::load_or_generate(&key_path).unwrap();
        assert_eq!(second.decrypt_str(&ct).unwrap(), "persisted");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
