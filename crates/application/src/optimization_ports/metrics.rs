use async_trait::async_trait;
use adtune_core::AppResult;
use adtune_domain::PerformanceRecord;
use chrono::{DateTime, Utc};

/// Time range of performance rows to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsQuery {
    /// Inclusive lower bound on window start.
    pub since: DateTime<Utc>,
    /// Exclusive upper bound on window end.
    pub until: DateTime<Utc>,
}

/// Port for the read-only metrics store.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Lists raw performance rows inside the query range.
    async fn list_windows(&self, query: MetricsQuery) -> AppResult<Vec<PerformanceRecord>>;
}
