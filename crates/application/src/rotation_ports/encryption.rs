use adtune_core::AppResult;

/// Symmetric encryption of secret payloads at rest.
pub trait SecretEncryptor: Send + Sync {
    /// Encrypts a plaintext payload.
    fn encrypt(&self, plaintext: &[u8]) -> AppResult<Vec<u8>>;

    /// Decrypts a payload produced by [`SecretEncryptor::encrypt`].
    fn decrypt(&self, ciphertext: &[u8]) -> AppResult<Vec<u8>>;
}
