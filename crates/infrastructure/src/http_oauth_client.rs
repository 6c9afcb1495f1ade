use async_trait::async_trait;
use adtune_application::{OAuthClient, TokenGrant};
use adtune_core::{AppError, AppResult, RefreshGrant};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::http_support;

/// Refresh-token grant against an OAuth 2.0 token endpoint.
#[derive(Clone)]
pub struct HttpOAuthClient {
    http_client: reqwest::Client,
    token_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl HttpOAuthClient {
    /// Creates a client for the given token endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http_client,
            token_url: token_url.into(),
        }
    }
}

#[async_trait]
impl OAuthClient for HttpOAuthClient {
    async fn refresh(&self, grant: RefreshGrant<'_>) -> AppResult<TokenGrant> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "refresh_token")
            .append_pair("refresh_token", grant.refresh_token)
            .append_pair("client_id", grant.client_id)
            .append_pair("client_secret", grant.client_secret)
            .finish();

        let response = self
            .http_client
            .post(self.token_url.as_str())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .send()
            .await
            .map_err(|error| http_support::transport_error("token refresh", &error))?;

        // A revoked or expired refresh token comes back as 400 invalid_grant.
        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            if body.contains("invalid_grant") {
                return Err(AppError::Unauthorized(
                    "refresh token was rejected (invalid_grant), re-run the OAuth consent flow"
                        .to_owned(),
                ));
            }
            return Err(AppError::Validation(format!(
                "token refresh failed with status 400: {body}"
            )));
        }
        if !response.status().is_success() {
            return Err(http_support::error_for_response(response, "token refresh").await);
        }

        let token: TokenResponse = response.json().await.map_err(|error| {
            AppError::Transient(format!("token endpoint returned invalid JSON: {error}"))
        })?;
        if token.access_token.trim().is_empty() {
            return Err(AppError::Validation(
                "token endpoint returned an empty access_token".to_owned(),
            ));
        }

        info!(
            expires_in = token.expires_in,
            refresh_token_rotated = token.refresh_token.is_some(),
            "access token refreshed"
        );
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token.filter(|value| !value.trim().is_empty()),
            expires_in: token.expires_in,
        })
    }
}
