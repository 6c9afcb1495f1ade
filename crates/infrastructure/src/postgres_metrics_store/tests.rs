use adtune_application::{MetricsQuery, MetricsStore};
use adtune_core::RunId;
use chrono::{Duration, DurationRound, Utc};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresMetricsStore;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for postgres metrics store tests: {error}");
    }

    Some(pool)
}

#[tokio::test]
async fn only_rows_inside_the_lookback_are_listed() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let Ok(today) = Utc::now().duration_trunc(Duration::days(1)) else {
        panic!("failed to truncate test timestamp");
    };
    let subject_id = format!("creative-{}", RunId::new());

    for days_ago in [1_i64, 30] {
        let start = today - Duration::days(days_ago);
        let insert = sqlx::query(
            r#"
            INSERT INTO creative_performance (
                subject_id,
                campaign_id,
                window_start,
                window_end,
                impressions,
                clicks,
                cost
            )
            VALUES ($1, 'campaign-metrics', $2, $3, 1000, 25, 50.0)
            "#,
        )
        .bind(&subject_id)
        .bind(start)
        .bind(start + Duration::days(1))
        .execute(&pool)
        .await;
        assert!(insert.is_ok());
    }

    let store = PostgresMetricsStore::new(pool);
    let rows = store
        .list_windows(MetricsQuery {
            since: today - Duration::days(7),
            until: today + Duration::days(1),
        })
        .await;
    assert!(rows.is_ok());
    let rows = rows.unwrap_or_default();

    let ours: Vec<_> = rows.iter().filter(|row| row.subject_id == subject_id).collect();
    assert_eq!(ours.len(), 1);
    assert_eq!(ours[0].clicks, 25);
    assert_eq!(ours[0].campaign_id.as_deref(), Some("campaign-metrics"));
}
