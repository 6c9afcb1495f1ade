use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use adtune_application::{SecretEncryptor, SecretStore};
use adtune_core::{ApiCredentials, AppError, AppResult};
use adtune_domain::{SecretVersion, StageLabel, StageUpdate, apply_stage_update};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

/// PostgreSQL-backed versioned secret store.
///
/// Credential payloads are encrypted before they reach the database. Stage
/// moves lock every version row of the secret inside a serializable
/// transaction.
#[derive(Clone)]
pub struct PostgresSecretStore {
    pool: PgPool,
    encryptor: Arc<dyn SecretEncryptor>,
}

impl PostgresSecretStore {
    /// Creates a store with the provided pool and payload encryptor.
    #[must_use]
    pub fn new(pool: PgPool, encryptor: Arc<dyn SecretEncryptor>) -> Self {
        Self { pool, encryptor }
    }

    fn decode(&self, row: SecretVersionRow) -> AppResult<SecretVersion> {
        let plaintext = self.encryptor.decrypt(&row.payload)?;
        let credentials: ApiCredentials = serde_json::from_slice(&plaintext).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode secret version '{}': {error}",
                row.version_id
            ))
        })?;
        let stages = row
            .stages
            .iter()
            .map(|stage| StageLabel::parse(stage))
            .collect::<AppResult<BTreeSet<_>>>()?;

        SecretVersion::new(
            row.version_id,
            stages,
            credentials,
            row.created_at,
            row.verified_at,
        )
    }

    async fn begin_locked(
        &self,
        secret_id: &str,
    ) -> AppResult<(Transaction<'static, Postgres>, Vec<SecretVersion>)> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start transaction for secret '{secret_id}': {error}"
            ))
        })?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_store_error(error, secret_id, "set isolation level"))?;

        let rows = sqlx::query_as::<_, SecretVersionRow>(
            r#"
            SELECT version_id, stages, payload, created_at, verified_at
            FROM credential_secret_versions
            WHERE secret_id = $1
            ORDER BY created_at, version_id
            FOR UPDATE
            "#,
        )
        .bind(secret_id)
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| map_store_error(error, secret_id, "lock versions"))?;

        let versions = rows
            .into_iter()
            .map(|row| self.decode(row))
            .collect::<AppResult<Vec<_>>>()?;
        Ok((transaction, versions))
    }
}

#[derive(Debug, FromRow)]
struct SecretVersionRow {
    version_id: String,
    stages: Vec<String>,
    payload: Vec<u8>,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

fn stage_names(version: &SecretVersion) -> Vec<String> {
    version
        .stages()
        .iter()
        .map(|stage| stage.as_str().to_owned())
        .collect()
}

fn map_store_error(error: sqlx::Error, secret_id: &str, operation: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error {
        match database_error.code().as_deref() {
            Some("23505") => {
                return AppError::Conflict(format!(
                    "secret '{secret_id}' changed concurrently during {operation}"
                ));
            }
            Some("40001") | Some("40P01") => {
                return AppError::Transient(format!(
                    "secret '{secret_id}' is locked by a concurrent rotation during {operation}"
                ));
            }
            _ => {}
        }
    }

    AppError::Internal(format!(
        "failed to {operation} for secret '{secret_id}': {error}"
    ))
}

#[async_trait]
impl SecretStore for PostgresSecretStore {
    async fn get_secret(
        &self,
        secret_id: &str,
        stage: StageLabel,
    ) -> AppResult<Option<SecretVersion>> {
        let row = sqlx::query_as::<_, SecretVersionRow>(
            r#"
            SELECT version_id, stages, payload, created_at, verified_at
            FROM credential_secret_versions
            WHERE secret_id = $1 AND $2 = ANY(stages)
            "#,
        )
        .bind(secret_id)
        .bind(stage.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_store_error(error, secret_id, "read stage"))?;

        row.map(|row| self.decode(row)).transpose()
    }

    async fn get_secret_version(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> AppResult<Option<SecretVersion>> {
        let row = sqlx::query_as::<_, SecretVersionRow>(
            r#"
            SELECT version_id, stages, payload, created_at, verified_at
            FROM credential_secret_versions
            WHERE secret_id = $1 AND version_id = $2
            "#,
        )
        .bind(secret_id)
        .bind(version_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| map_store_error(error, secret_id, "read version"))?;

        row.map(|row| self.decode(row)).transpose()
    }

    async fn put_secret_version(
        &self,
        secret_id: &str,
        version_id: &str,
        stage: StageLabel,
        credentials: ApiCredentials,
    ) -> AppResult<SecretVersion> {
        let (mut transaction, versions) = self.begin_locked(secret_id).await?;

        if versions
            .iter()
            .any(|version| version.version_id().as_str() == version_id)
        {
            return Err(AppError::Conflict(format!(
                "version '{version_id}' of secret '{secret_id}' already exists"
            )));
        }
        if stage == StageLabel::Current && !versions.is_empty() {
            return Err(AppError::Conflict(format!(
                "secret '{secret_id}' already has versions, AWSCURRENT moves only by promotion"
            )));
        }

        let stored = SecretVersion::new(
            version_id,
            BTreeSet::from([stage]),
            credentials,
            Utc::now(),
            None,
        )?;
        let plaintext = serde_json::to_vec(stored.credentials()).map_err(|error| {
            AppError::Internal(format!(
                "failed to serialize secret version '{version_id}': {error}"
            ))
        })?;
        let payload = self.encryptor.encrypt(&plaintext)?;

        sqlx::query(
            r#"
            UPDATE credential_secret_versions
            SET stages = array_remove(stages, $2)
            WHERE secret_id = $1 AND $2 = ANY(stages)
            "#,
        )
        .bind(secret_id)
        .bind(stage.as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_store_error(error, secret_id, "release stage"))?;

        sqlx::query(
            r#"
            INSERT INTO credential_secret_versions (
                secret_id,
                version_id,
                stages,
                payload,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(secret_id)
        .bind(version_id)
        .bind(stage_names(&stored))
        .bind(payload)
        .bind(stored.created_at())
        .execute(&mut *transaction)
        .await
        .map_err(|error| map_store_error(error, secret_id, "insert version"))?;

        transaction
            .commit()
            .await
            .map_err(|error| map_store_error(error, secret_id, "commit new version"))?;

        Ok(stored)
    }

    async fn mark_verified(
        &self,
        secret_id: &str,
        version_id: &str,
        verified_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE credential_secret_versions
            SET verified_at = $3
            WHERE secret_id = $1 AND version_id = $2 AND $4 = ANY(stages)
            "#,
        )
        .bind(secret_id)
        .bind(version_id)
        .bind(verified_at)
        .bind(StageLabel::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| map_store_error(error, secret_id, "mark version verified"))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM credential_secret_versions
                WHERE secret_id = $1 AND version_id = $2
            )
            "#,
        )
        .bind(secret_id)
        .bind(version_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| map_store_error(error, secret_id, "look up version"))?;

        if exists {
            Err(AppError::Conflict(format!(
                "version '{version_id}' of secret '{secret_id}' no longer holds AWSPENDING"
            )))
        } else {
            Err(AppError::NotFound(format!(
                "version '{version_id}' of secret '{secret_id}' does not exist"
            )))
        }
    }

    async fn update_stage(&self, secret_id: &str, update: StageUpdate) -> AppResult<()> {
        let (mut transaction, mut versions) = self.begin_locked(secret_id).await?;
        if versions.is_empty() {
            return Err(AppError::NotFound(format!(
                "secret '{secret_id}' does not exist"
            )));
        }

        let before = versions.clone();
        apply_stage_update(&mut versions, &update)?;

        for (previous, version) in before.iter().zip(versions.iter()) {
            if previous.stages() == version.stages() {
                continue;
            }

            sqlx::query(
                r#"
                UPDATE credential_secret_versions
                SET stages = $3
                WHERE secret_id = $1 AND version_id = $2
                "#,
            )
            .bind(secret_id)
            .bind(version.version_id().as_str())
            .bind(stage_names(version))
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_store_error(error, secret_id, "move stage"))?;
        }

        transaction
            .commit()
            .await
            .map_err(|error| map_store_error(error, secret_id, "commit stage move"))
    }
}

#[cfg(test)]
mod tests;
