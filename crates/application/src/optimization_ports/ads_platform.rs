use async_trait::async_trait;
use adtune_core::AppResult;
use adtune_domain::{ContentPatch, CreativeStatus};

/// Port for the ads-platform capabilities the executor needs.
///
/// Implementations classify failures: `Transient`/`RateLimited` for 5xx,
/// timeouts and 429, `Unauthorized` for rejected credentials and
/// `Validation` for every other rejected request. Retries are the caller's
/// concern.
#[async_trait]
pub trait AdsPlatform: Send + Sync {
    /// Stops delivery of a creative.
    async fn pause(&self, creative_id: &str, idempotency_key: &str) -> AppResult<()>;

    /// Duplicates a creative with patched content and returns the new creative id.
    async fn duplicate_with_variation(
        &self,
        creative_id: &str,
        patch: &ContentPatch,
        idempotency_key: &str,
    ) -> AppResult<String>;

    /// Sets the campaign bid in the account currency.
    async fn set_bid(&self, campaign_id: &str, amount: f64, idempotency_key: &str)
    -> AppResult<()>;

    /// Performs a lightweight authenticated read.
    async fn test_token(&self) -> AppResult<()>;

    /// Reads the current delivery status of a creative.
    async fn get_status(&self, subject_id: &str) -> AppResult<CreativeStatus>;
}
