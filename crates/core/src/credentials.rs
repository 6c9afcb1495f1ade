use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};

use crate::{AppError, AppResult};

/// OAuth credential bundle stored in one secret version.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiCredentials {
    access_token: String,
    refresh_token: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rotated_at: Option<String>,
}

impl ApiCredentials {
    /// Creates a credential bundle.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            client_id,
            client_secret,
            rotated_at: None,
        }
    }

    /// Returns the bearer token for platform calls.
    #[must_use]
    pub fn access_token(&self) -> &str {
        self.access_token.as_str()
    }

    /// Returns the refresh token, if one was issued.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Returns the OAuth client identifier.
    #[must_use]
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Returns the OAuth client secret.
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }

    /// Returns the RFC 3339 timestamp of the rotation that produced this bundle.
    #[must_use]
    pub fn rotated_at(&self) -> Option<&str> {
        self.rotated_at.as_deref()
    }

    /// Returns the fields required by the refresh-token grant.
    pub fn refresh_grant(&self) -> AppResult<RefreshGrant<'_>> {
        match (
            non_blank(self.client_id.as_deref()),
            non_blank(self.client_secret.as_deref()),
            non_blank(self.refresh_token.as_deref()),
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => Ok(RefreshGrant {
                client_id,
                client_secret,
                refresh_token,
            }),
            _ => Err(AppError::Validation(
                "credentials require client_id, client_secret and refresh_token for refresh"
                    .to_owned(),
            )),
        }
    }

    /// Returns a copy carrying a freshly issued token pair.
    ///
    /// Platforms that do not rotate refresh tokens omit one from the grant;
    /// the previous refresh token is kept in that case.
    #[must_use]
    pub fn with_refreshed_tokens(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        rotated_at: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.or_else(|| self.refresh_token.clone()),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            rotated_at: Some(rotated_at.into()),
        }
    }
}

impl Debug for ApiCredentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiCredentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("rotated_at", &self.rotated_at)
            .finish()
    }
}

/// Borrowed view of the values sent to the token endpoint.
#[derive(Clone, Copy)]
pub struct RefreshGrant<'a> {
    /// OAuth client identifier.
    pub client_id: &'a str,
    /// OAuth client secret.
    pub client_secret: &'a str,
    /// Refresh token exchanged for a new access token.
    pub refresh_token: &'a str,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
