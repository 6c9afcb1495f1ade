//! AES-256-GCM encryptor for credential payloads at rest.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use adtune_application::SecretEncryptor;
use adtune_core::{AppError, AppResult};

const NONCE_LEN: usize = 12;

/// AES-256-GCM encryptor for secret versions stored in the database.
///
/// Output layout is the 12-byte nonce followed by the ciphertext and tag.
#[derive(Clone)]
pub struct AesSecretEncryptor {
    cipher: Aes256Gcm,
}

impl AesSecretEncryptor {
    /// Creates a new encryptor from a 32-byte key.
    #[must_use]
    pub fn new(key_bytes: &[u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new(key_bytes.into()),
        }
    }

    /// Creates a new encryptor from a hex-encoded 32-byte key.
    pub fn from_hex(hex_key: &str) -> AppResult<Self> {
        let decoded = hex::decode(hex_key.trim()).map_err(|error| {
            AppError::Validation(format!("invalid SECRET_ENCRYPTION_KEY hex: {error}"))
        })?;

        let key: [u8; 32] = decoded.as_slice().try_into().map_err(|_| {
            AppError::Validation(
                "SECRET_ENCRYPTION_KEY must be exactly 32 bytes (64 hex chars)".to_owned(),
            )
        })?;
        Ok(Self::new(&key))
    }
}

impl SecretEncryptor for AesSecretEncryptor {
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|error| AppError::Internal(format!("failed to encrypt secret: {error}")))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn decrypt(&self, sealed: &[u8]) -> AppResult<Vec<u8>> {
        if sealed.len() < NONCE_LEN {
            return Err(AppError::Internal(
                "sealed secret too short: missing nonce".to_owned(),
            ));
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce_array: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| AppError::Internal("nonce must be exactly 12 bytes".to_owned()))?;

        self.cipher
            .decrypt(&Nonce::from(nonce_array), ciphertext)
            .map_err(|error| AppError::Internal(format!("failed to decrypt secret: {error}")))
    }
}
