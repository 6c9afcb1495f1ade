use async_trait::async_trait;
use adtune_application::{AdsPlatform, CredentialVerifier};
use adtune_core::{ApiCredentials, AppResult};

use crate::HttpAdsPlatform;

/// Verifies credentials with the ads platform's token check.
#[derive(Clone)]
pub struct HttpCredentialVerifier {
    platform: HttpAdsPlatform,
}

impl HttpCredentialVerifier {
    /// Creates a verifier reusing the platform adapter's endpoints.
    #[must_use]
    pub fn new(platform: HttpAdsPlatform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl CredentialVerifier for HttpCredentialVerifier {
    async fn verify(&self, credentials: &ApiCredentials) -> AppResult<()> {
        self.platform
            .with_access_token(credentials.access_token())
            .test_token()
            .await
    }
}
