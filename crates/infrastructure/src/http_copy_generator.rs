use async_trait::async_trait;
use adtune_application::{ContentSuggestion, CopyGenerator, VariationContext};
use adtune_core::{AppError, AppResult};
use serde::Deserialize;

use crate::http_support;

/// Ad copy generator served over HTTP.
///
/// `POST {endpoint}` with the winning creative's context as JSON; the
/// response carries `variation` with optional `headline`, `description`
/// and `call_to_action`, or `null` to keep the original copy.
#[derive(Clone)]
pub struct HttpCopyGenerator {
    http_client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct VariationResponse {
    #[serde(default)]
    variation: Option<ContentSuggestion>,
}

impl HttpCopyGenerator {
    /// Creates a copy generator client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl CopyGenerator for HttpCopyGenerator {
    async fn suggest_variation(
        &self,
        context: &VariationContext,
    ) -> AppResult<Option<ContentSuggestion>> {
        let response = http_support::send(
            self.http_client.post(self.endpoint.as_str()).json(context),
            "copy generation",
        )
        .await?;

        let generated: VariationResponse = response.json().await.map_err(|error| {
            AppError::Transient(format!("copy generation returned invalid JSON: {error}"))
        })?;
        Ok(generated.variation)
    }
}

#[cfg(test)]
mod tests {
    use adtune_application::{CopyGenerator, VariationContext};

    use crate::stub_http_server::{self, StubResponse};

    use super::HttpCopyGenerator;

    fn context() -> VariationContext {
        VariationContext {
            creative_id: "creative-7".to_owned(),
            campaign_id: "campaign-1".to_owned(),
            lookback_days: 7,
            impressions: 3_000,
            clicks: 120,
            conversions: 6,
            ctr_percent: 4.0,
            cpc: Some(2.5),
        }
    }

    #[tokio::test]
    async fn variation_and_abstention_are_both_accepted() {
        let server = stub_http_server::spawn(vec![
            StubResponse::json(
                200,
                r#"{"variation":{"headline":"Close your books faster","description":null}}"#,
            ),
            StubResponse::json(200, r#"{"variation":null}"#),
        ])
        .await;
        let generator = HttpCopyGenerator::new(reqwest::Client::new(), server.base_url.clone());

        let generated = generator.suggest_variation(&context()).await;
        assert!(matches!(
            &generated,
            Ok(Some(variation))
                if variation.headline.as_deref() == Some("Close your books faster")
                    && variation.description.is_none()
        ));
        assert!(matches!(generator.suggest_variation(&context()).await, Ok(None)));

        let requests = server.requests.lock().await;
        assert!(requests[0].body.contains(r#""creative_id":"creative-7""#));
    }

    #[tokio::test]
    async fn unavailable_generator_is_an_error() {
        let server = stub_http_server::spawn(vec![StubResponse::json(502, "{}")]).await;
        let generator = HttpCopyGenerator::new(reqwest::Client::new(), server.base_url.clone());

        assert!(generator.suggest_variation(&context()).await.is_err());
    }
}
