use async_trait::async_trait;
use adtune_application::{CampaignContext, ScoringService};
use adtune_core::{AppError, AppResult};
use serde::Deserialize;

use crate::http_support;

/// Bid scoring model served over HTTP.
///
/// `POST {endpoint}` with the campaign context as JSON; the response carries
/// `suggested_bid` as a number or `null`.
#[derive(Clone)]
pub struct HttpScoringService {
    http_client: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct ScoringResponse {
    #[serde(default)]
    suggested_bid: Option<f64>,
}

impl HttpScoringService {
    /// Creates a scoring client.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ScoringService for HttpScoringService {
    async fn suggest_bid(&self, context: &CampaignContext) -> AppResult<Option<f64>> {
        let response = http_support::send(
            self.http_client.post(self.endpoint.as_str()).json(context),
            "bid scoring",
        )
        .await?;

        let scored: ScoringResponse = response.json().await.map_err(|error| {
            AppError::Transient(format!("bid scoring returned invalid JSON: {error}"))
        })?;
        Ok(scored.suggested_bid)
    }
}

#[cfg(test)]
mod tests {
    use adtune_application::{CampaignContext, ScoringService};

    use crate::stub_http_server::{self, StubResponse};

    use super::HttpScoringService;

    fn context() -> CampaignContext {
        CampaignContext {
            campaign_id: "campaign-1".to_owned(),
            lookback_days: 7,
            impressions: 10_000,
            clicks: 200,
            cost: 1_000.0,
            conversions: 4,
            ctr_percent: 2.0,
            cpc: Some(5.0),
        }
    }

    #[tokio::test]
    async fn suggestion_and_abstention_are_both_accepted() {
        let server = stub_http_server::spawn(vec![
            StubResponse::json(200, r#"{"suggested_bid":6.25}"#),
            StubResponse::json(200, r#"{"suggested_bid":null}"#),
        ])
        .await;
        let scoring = HttpScoringService::new(reqwest::Client::new(), server.base_url.clone());

        assert!(matches!(scoring.suggest_bid(&context()).await, Ok(Some(bid)) if bid == 6.25));
        assert!(matches!(scoring.suggest_bid(&context()).await, Ok(None)));

        let requests = server.requests.lock().await;
        assert!(requests[0].body.contains(r#""campaign_id":"campaign-1""#));
    }

    #[tokio::test]
    async fn unavailable_model_is_an_error() {
        let server = stub_http_server::spawn(vec![StubResponse::json(503, "{}")]).await;
        let scoring = HttpScoringService::new(reqwest::Client::new(), server.base_url.clone());

        assert!(scoring.suggest_bid(&context()).await.is_err());
    }
}
