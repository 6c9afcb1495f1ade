use async_trait::async_trait;
use adtune_core::AppResult;
use serde::{Deserialize, Serialize};

/// Winning creative aggregate sent to the copy generator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariationContext {
    /// Creative being scaled.
    pub creative_id: String,
    /// Campaign owning the creative.
    pub campaign_id: String,
    /// Trailing period the aggregate covers.
    pub lookback_days: u32,
    /// Impressions in the period.
    pub impressions: u64,
    /// Clicks in the period.
    pub clicks: u64,
    /// Conversions in the period.
    pub conversions: u64,
    /// Click-through rate in percent.
    pub ctr_percent: f64,
    /// Cost per click, absent without clicks.
    pub cpc: Option<f64>,
}

/// Rewritten copy for the duplicate of a winning creative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSuggestion {
    /// Replacement headline.
    #[serde(default)]
    pub headline: Option<String>,
    /// Replacement description.
    #[serde(default)]
    pub description: Option<String>,
    /// Replacement call-to-action.
    #[serde(default)]
    pub call_to_action: Option<String>,
}

/// Port for the optional ad copy generator.
#[async_trait]
pub trait CopyGenerator: Send + Sync {
    /// Returns new copy for the creative, or `None` to duplicate it unchanged.
    async fn suggest_variation(
        &self,
        context: &VariationContext,
    ) -> AppResult<Option<ContentSuggestion>>;
}
