use std::sync::Arc;

use adtune_application::SecretStore;
use adtune_core::{ApiCredentials, AppError, RunId};
use adtune_domain::{StageLabel, StageUpdate};
use chrono::Utc;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use super::PostgresSecretStore;
use crate::AesSecretEncryptor;

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
        panic!("failed to run migrations for postgres secret store tests: {error}");
    }

    Some(pool)
}

fn store(pool: PgPool) -> PostgresSecretStore {
    PostgresSecretStore::new(pool, Arc::new(AesSecretEncryptor::new(&[7_u8; 32])))
}

fn credentials(token: &str) -> ApiCredentials {
    ApiCredentials::new(
        token,
        Some(format!("refresh-{token}")),
        Some("client".to_owned()),
        Some("client-secret".to_owned()),
    )
}

#[tokio::test]
async fn payloads_are_encrypted_and_round_trip() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = store(pool.clone());
    let secret_id = format!("ads/{}", RunId::new());
    let stored = store
        .put_secret_version(&secret_id, "v1", StageLabel::Current, credentials("token-1"))
        .await;
    assert!(stored.is_ok());

    let raw: Result<Vec<u8>, sqlx::Error> = sqlx::query_scalar(
        "SELECT payload FROM credential_secret_versions WHERE secret_id = $1 AND version_id = 'v1'",
    )
    .bind(&secret_id)
    .fetch_one(&pool)
    .await;
    assert!(raw.is_ok());
    let raw = raw.unwrap_or_default();
    assert!(!raw.windows(7).any(|window| window == b"token-1"));

    let current = store.get_secret(&secret_id, StageLabel::Current).await;
    assert!(matches!(
        current,
        Ok(Some(version)) if version.credentials().access_token() == "token-1"
    ));
}

#[tokio::test]
async fn promotion_is_compare_and_swap() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = store(pool);
    let secret_id = format!("ads/{}", RunId::new());
    let _ = store
        .put_secret_version(&secret_id, "v1", StageLabel::Current, credentials("token-1"))
        .await;
    let _ = store
        .put_secret_version(&secret_id, "v2", StageLabel::Pending, credentials("token-2"))
        .await;
    assert!(store.mark_verified(&secret_id, "v2", Utc::now()).await.is_ok());

    let stale = store
        .update_stage(
            &secret_id,
            StageUpdate {
                stage: StageLabel::Current,
                move_to_version_id: "v2".to_owned(),
                remove_from_version_id: Some("v0".to_owned()),
            },
        )
        .await;
    assert!(matches!(stale, Err(AppError::Conflict(_))));

    let promoted = store
        .update_stage(
            &secret_id,
            StageUpdate {
                stage: StageLabel::Current,
                move_to_version_id: "v2".to_owned(),
                remove_from_version_id: Some("v1".to_owned()),
            },
        )
        .await;
    assert!(promoted.is_ok());

    let current = store.get_secret(&secret_id, StageLabel::Current).await;
    assert!(matches!(
        current,
        Ok(Some(version)) if version.version_id().as_str() == "v2" && version.verified_at().is_some()
    ));
    let previous = store.get_secret(&secret_id, StageLabel::Previous).await;
    assert!(matches!(
        previous,
        Ok(Some(version)) if version.version_id().as_str() == "v1"
    ));
    let pending = store.get_secret(&secret_id, StageLabel::Pending).await;
    assert!(matches!(pending, Ok(None)));
}

#[tokio::test]
async fn marking_an_unknown_version_is_not_found() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = store(pool);
    let result = store
        .mark_verified(&format!("ads/{}", RunId::new()), "missing", Utc::now())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn marking_a_superseded_version_is_a_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let store = store(pool);
    let secret_id = format!("ads/{}", RunId::new());
    let _ = store
        .put_secret_version(&secret_id, "v1", StageLabel::Current, credentials("token-1"))
        .await;
    let _ = store
        .put_secret_version(&secret_id, "v2", StageLabel::Pending, credentials("token-2"))
        .await;
    let _ = store
        .put_secret_version(&secret_id, "v3", StageLabel::Pending, credentials("token-3"))
        .await;

    let superseded = store.mark_verified(&secret_id, "v2", Utc::now()).await;
    assert!(matches!(superseded, Err(AppError::Conflict(_))));

    let version = store.get_secret_version(&secret_id, "v2").await;
    assert!(matches!(
        version,
        Ok(Some(version)) if version.verified_at().is_none()
    ));
    assert!(store.mark_verified(&secret_id, "v3", Utc::now()).await.is_ok());
}
