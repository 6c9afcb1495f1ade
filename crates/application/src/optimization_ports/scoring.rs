use async_trait::async_trait;
use adtune_core::AppResult;
use serde::Serialize;

/// Campaign aggregate sent to the scoring service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignContext {
    /// Campaign identifier.
    pub campaign_id: String,
    /// Trailing period the aggregate covers.
    pub lookback_days: u32,
    /// Impressions in the period.
    pub impressions: u64,
    /// Clicks in the period.
    pub clicks: u64,
    /// Spend in the period.
    pub cost: f64,
    /// Conversions in the period.
    pub conversions: u64,
    /// Click-through rate in percent.
    pub ctr_percent: f64,
    /// Cost per click, absent without clicks.
    pub cpc: Option<f64>,
}

/// Port for the optional bid scoring model.
#[async_trait]
pub trait ScoringService: Send + Sync {
    /// Returns a suggested bid, or `None` when the model has no opinion.
    async fn suggest_bid(&self, context: &CampaignContext) -> AppResult<Option<f64>>;
}
