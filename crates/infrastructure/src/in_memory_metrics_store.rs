use async_trait::async_trait;
use adtune_application::{MetricsQuery, MetricsStore};
use adtune_core::{AppError, AppResult};
use adtune_domain::PerformanceRecord;

/// Metrics store over a fixed set of rows, loaded from JSON for local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsStore {
    rows: Vec<PerformanceRecord>,
}

impl InMemoryMetricsStore {
    /// Creates a store over the given rows.
    #[must_use]
    pub fn new(rows: Vec<PerformanceRecord>) -> Self {
        Self { rows }
    }

    /// Parses a JSON array of performance rows.
    pub fn from_json(json: &str) -> AppResult<Self> {
        let rows = serde_json::from_str(json).map_err(|error| {
            AppError::Validation(format!("invalid performance rows JSON: {error}"))
        })?;
        Ok(Self::new(rows))
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn list_windows(&self, query: MetricsQuery) -> AppResult<Vec<PerformanceRecord>> {
        Ok(self
            .rows
            .iter()
            .filter(|row| row.window_start >= query.since && row.window_end <= query.until)
            .cloned()
            .collect())
    }
}
