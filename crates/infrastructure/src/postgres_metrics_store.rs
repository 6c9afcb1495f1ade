use async_trait::async_trait;
use adtune_application::{MetricsQuery, MetricsStore};
use adtune_core::{AppError, AppResult};
use adtune_domain::{PerformanceRecord, SubjectKind};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed store of daily performance rows.
#[derive(Clone)]
pub struct PostgresMetricsStore {
    pool: PgPool,
}

impl PostgresMetricsStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct PerformanceRow {
    subject_id: String,
    subject_kind: String,
    campaign_id: Option<String>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    impressions: i64,
    clicks: i64,
    cost: f64,
    conversions: i64,
}

#[async_trait]
impl MetricsStore for PostgresMetricsStore {
    async fn list_windows(&self, query: MetricsQuery) -> AppResult<Vec<PerformanceRecord>> {
        let rows = sqlx::query_as::<_, PerformanceRow>(
            r#"
            SELECT
                subject_id,
                subject_kind,
                campaign_id,
                window_start,
                window_end,
                impressions,
                clicks,
                cost,
                conversions
            FROM creative_performance
            WHERE window_start >= $1 AND window_end <= $2
            ORDER BY subject_kind, subject_id, window_start
            "#,
        )
        .bind(query.since)
        .bind(query.until)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Transient(format!("failed to list performance rows: {error}"))
        })?;

        rows.into_iter()
            .map(|row| {
                Ok(PerformanceRecord {
                    subject_kind: SubjectKind::parse(row.subject_kind.as_str())?,
                    subject_id: row.subject_id,
                    campaign_id: row.campaign_id,
                    window_start: row.window_start,
                    window_end: row.window_end,
                    impressions: row.impressions,
                    clicks: row.clicks,
                    cost: row.cost,
                    conversions: row.conversions,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
