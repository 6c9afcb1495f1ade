use async_trait::async_trait;
use adtune_core::{ApiCredentials, AppResult, RefreshGrant};

/// Token pair issued by the OAuth token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    /// New bearer token.
    pub access_token: String,
    /// New refresh token, absent when the platform keeps the old one valid.
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TokenGrant")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Port for the refresh-token grant.
#[async_trait]
pub trait OAuthClient: Send + Sync {
    /// Exchanges a refresh token for a new token pair.
    async fn refresh(&self, grant: RefreshGrant<'_>) -> AppResult<TokenGrant>;
}

/// Port for checking that a credential bundle is accepted by the platform.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Performs a lightweight authenticated read with the given credentials.
    async fn verify(&self, credentials: &ApiCredentials) -> AppResult<()>;
}
