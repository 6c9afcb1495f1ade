use async_trait::async_trait;
use adtune_application::AdsPlatform;
use adtune_core::{AppError, AppResult};
use adtune_domain::{ContentPatch, Creative, CreativeContent, CreativeStatus};
use reqwest::Method;
use serde_json::{Map, Value, json};
use tracing::{info, warn};
use url::Url;

use crate::http_support;


/// Endpoints and headers of the LinkedIn Marketing REST API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdsApiConfig {
    /// REST base URL, e.g. `https://api.linkedin.com/rest`.
    pub base_url: String,
    /// Value of the `LinkedIn-Version` header.
    pub api_version: String,
    /// Currency for bid amounts.
    pub currency_code: String,
    /// Lightweight authenticated read used to check a token.
    pub token_check_url: String,
}

impl Default for AdsApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.linkedin.com/rest".to_owned(),
            api_version: "202411".to_owned(),
            currency_code: "USD".to_owned(),
            token_check_url: "https://api.linkedin.com/v2/me".to_owned(),
        }
    }
}

/// Ads platform adapter over the LinkedIn Marketing REST API.
///
/// Makes a single attempt per call; retries belong to the executor.
#[derive(Clone)]
pub struct HttpAdsPlatform {
    http_client: reqwest::Client,
    config: AdsApiConfig,
    access_token: String,
}

impl HttpAdsPlatform {
    /// Creates an adapter authenticated with one access token.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        config: AdsApiConfig,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            config,
            access_token: access_token.into(),
        }
    }

    /// Returns a copy authenticated with a different access token.
    #[must_use]
    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            ..self.clone()
        }
    }

    fn resource_url(&self, collection: &str, id: Option<&str>) -> AppResult<Url> {
        let mut url = Url::parse(self.config.base_url.as_str()).map_err(|error| {
            AppError::Validation(format!(
                "invalid ads API base url '{}': {error}",
                self.config.base_url
            ))
        })?;

        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                AppError::Validation(format!(
                    "ads API base url '{}' cannot carry a path",
                    self.config.base_url
                ))
            })?;
            segments.pop_if_empty().push(collection);
            if let Some(id) = id {
                segments.push(id);
            }
        }

        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(self.access_token.as_str())
            .header("X-Restli-Protocol-Version", "2.0.0")
            .header("LinkedIn-Version", self.config.api_version.as_str())
    }

    async fn patch_creative(
        &self,
        creative_id: &str,
        body: Value,
        idempotency_key: &str,
        context: &str,
    ) -> AppResult<()> {
        let url = self.resource_url("creatives", Some(creative_id))?;
        http_support::send(
            self.request(Method::PATCH, url)
                .header("Idempotency-Key", idempotency_key)
                .json(&body),
            context,
        )
        .await?;
        Ok(())
    }

    async fn fetch_creative(&self, creative_id: &str) -> AppResult<Map<String, Value>> {
        let url = self.resource_url("creatives", Some(creative_id))?;
        let response = http_support::send(self.request(Method::GET, url), "creative read").await?;
        let body: Value = response.json().await.map_err(|error| {
            AppError::Transient(format!("creative '{creative_id}' returned invalid JSON: {error}"))
        })?;

        match body {
            Value::Object(creative) => Ok(creative),
            _ => Err(AppError::Validation(format!(
                "creative '{creative_id}' response is not an object"
            ))),
        }
    }

    async fn create_draft(
        &self,
        source: &Map<String, Value>,
        snapshot: &Creative,
        patch: &ContentPatch,
        idempotency_key: &str,
    ) -> AppResult<String> {
        let mut draft = json!({
            "campaign": snapshot.campaign_id().as_str(),
            "intendedStatus": "DRAFT",
            "name": patch.variant_label,
        });
        if let (Some(content), Value::Object(fields)) = (source.get("content"), &mut draft) {
            fields.insert("content".to_owned(), content.clone());
        }

        let url = self.resource_url("creatives", None)?;
        let response = http_support::send(
            self.request(Method::POST, url)
                .header("Idempotency-Key", idempotency_key)
                .json(&draft),
            "creative duplicate",
        )
        .await?;

        if let Some(created_id) = response
            .headers()
            .get("x-restli-id")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
        {
            return Ok(created_id.to_owned());
        }

        let body: Value = response.json().await.map_err(|error| {
            AppError::Internal(format!("creative duplicate returned no id: {error}"))
        })?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| AppError::Internal("creative duplicate returned no id".to_owned()))
    }
}

/// Typed snapshot of a creative read from the platform.
fn creative_snapshot(creative_id: &str, source: &Map<String, Value>) -> AppResult<Creative> {
    let text = |field: &str| {
        source
            .get("content")
            .and_then(|content| content.get(field))
            .or_else(|| source.get(field))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned()
    };
    let status = source
        .get("intendedStatus")
        .or_else(|| source.get("status"))
        .and_then(Value::as_str)
        .map_or(Ok(CreativeStatus::Active), CreativeStatus::parse)?;
    let campaign_id = source
        .get("campaign")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Creative::new(
        creative_id,
        campaign_id,
        status,
        CreativeContent {
            headline: text("headline"),
            description: text("description"),
            call_to_action: text("callToAction"),
        },
    )
    .map_err(|error| {
        AppError::Validation(format!("creative '{creative_id}' is incomplete: {error}"))
    })
}

/// Body activating a duplicated creative with the patched content.
fn activation_body(snapshot: &Creative, patch: &ContentPatch) -> Value {
    let mut body = Map::new();
    body.insert("intendedStatus".to_owned(), json!("ACTIVE"));
    body.insert("name".to_owned(), json!(patch.variant_label));
    if patch.is_label_only() {
        return Value::Object(body);
    }

    let content = snapshot.content().apply(patch);
    for (field, value) in [
        ("headline", content.headline),
        ("description", content.description),
        ("callToAction", content.call_to_action),
    ] {
        if !value.is_empty() {
            body.insert(field.to_owned(), json!(value));
        }
    }
    Value::Object(body)
}

#[async_trait]
impl AdsPlatform for HttpAdsPlatform {
    async fn pause(&self, creative_id: &str, idempotency_key: &str) -> AppResult<()> {
        self.patch_creative(
            creative_id,
            json!({ "intendedStatus": "PAUSED" }),
            idempotency_key,
            "creative pause",
        )
        .await
    }

    async fn duplicate_with_variation(
        &self,
        creative_id: &str,
        patch: &ContentPatch,
        idempotency_key: &str,
    ) -> AppResult<String> {
        let source = self.fetch_creative(creative_id).await?;
        let snapshot = creative_snapshot(creative_id, &source)?;
        let draft_id = self
            .create_draft(&source, &snapshot, patch, idempotency_key)
            .await?;

        let activated = self
            .patch_creative(
                draft_id.as_str(),
                activation_body(&snapshot, patch),
                format!("{idempotency_key}:activate").as_str(),
                "creative activation",
            )
            .await;

        if let Err(activation_error) = activated {
            warn!(
                creative_id,
                draft_id = %draft_id,
                error = %activation_error,
                "variation activation failed, archiving draft"
            );
            let archived = self
                .patch_creative(
                    draft_id.as_str(),
                    json!({ "intendedStatus": "ARCHIVED" }),
                    format!("{idempotency_key}:archive").as_str(),
                    "draft archive",
                )
                .await;
            if let Err(archive_error) = archived {
                warn!(draft_id = %draft_id, error = %archive_error, "draft archive failed");
            }
            return Err(activation_error);
        }

        info!(creative_id, created_id = %draft_id, "variation created");
        Ok(draft_id)
    }

    async fn set_bid(
        &self,
        campaign_id: &str,
        amount: f64,
        idempotency_key: &str,
    ) -> AppResult<()> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation(format!(
                "bid for campaign '{campaign_id}' must be positive, got {amount}"
            )));
        }

        let url = self.resource_url("adCampaigns", Some(campaign_id))?;
        http_support::send(
            self.request(Method::PATCH, url)
                .header("Idempotency-Key", idempotency_key)
                .json(&json!({
                    "unitCost": {
                        "amount": format!("{amount:.2}"),
                        "currencyCode": self.config.currency_code,
                    }
                })),
            "campaign bid update",
        )
        .await?;
        Ok(())
    }

    async fn test_token(&self) -> AppResult<()> {
        let url = Url::parse(self.config.token_check_url.as_str()).map_err(|error| {
            AppError::Validation(format!(
                "invalid token check url '{}': {error}",
                self.config.token_check_url
            ))
        })?;
        http_support::send(self.request(Method::GET, url), "token check").await?;
        Ok(())
    }

    async fn get_status(&self, subject_id: &str) -> AppResult<CreativeStatus> {
        let creative = self.fetch_creative(subject_id).await?;
        let status = creative
            .get("intendedStatus")
            .or_else(|| creative.get("status"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::Validation(format!("creative '{subject_id}' has no status"))
            })?;

        CreativeStatus::parse(status)
    }
}
