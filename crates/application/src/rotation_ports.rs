mod encryption;
mod oauth;
mod secret_store;

pub use encryption::SecretEncryptor;
pub use oauth::{CredentialVerifier, OAuthClient, TokenGrant};
pub use secret_store::SecretStore;
