use async_trait::async_trait;
use adtune_application::{AuditLog, AuditRecord};
use adtune_core::{AppError, AppResult, RunId};
use adtune_domain::Action;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed append-only audit log.
#[derive(Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    /// Creates an audit log with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditRecordRow {
    run_id: uuid::Uuid,
    sequence: i32,
    recorded_at: DateTime<Utc>,
    action: Value,
}

impl TryFrom<AuditRecordRow> for AuditRecord {
    type Error = AppError;

    fn try_from(row: AuditRecordRow) -> Result<Self, Self::Error> {
        let action: Action = serde_json::from_value(row.action).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode audit record of run {}: {error}",
                row.run_id
            ))
        })?;
        let sequence = u32::try_from(row.sequence).map_err(|_| {
            AppError::Internal(format!(
                "audit record of run {} has negative sequence {}",
                row.run_id, row.sequence
            ))
        })?;

        Ok(Self {
            run_id: RunId::from_uuid(row.run_id),
            sequence,
            recorded_at: row.recorded_at,
            action,
        })
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, run_id: RunId, actions: &[Action]) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start audit transaction for run {run_id}: {error}"
            ))
        })?;

        for (sequence, action) in actions.iter().enumerate() {
            let sequence = i32::try_from(sequence).map_err(|_| {
                AppError::Validation(format!("run {run_id} has too many actions to audit"))
            })?;
            let action_json = serde_json::to_value(action).map_err(|error| {
                AppError::Internal(format!(
                    "failed to serialize action '{}': {error}",
                    action.action_id()
                ))
            })?;

            sqlx::query(
                r#"
                INSERT INTO optimizer_audit_records (
                    run_id,
                    action_id,
                    sequence,
                    subject_id,
                    action_kind,
                    outcome,
                    action
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(run_id.as_uuid())
            .bind(action.action_id())
            .bind(sequence)
            .bind(action.subject_id().as_str())
            .bind(action.kind().as_str())
            .bind(action.outcome().as_str())
            .bind(action_json)
            .execute(&mut *transaction)
            .await
            .map_err(|error| map_append_error(error, run_id, action.action_id()))?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit audit transaction for run {run_id}: {error}"
            ))
        })
    }

    async fn list_recent(
        &self,
        subject_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<AuditRecord>> {
        let rows = sqlx::query_as::<_, AuditRecordRow>(
            r#"
            SELECT run_id, sequence, recorded_at, action
            FROM optimizer_audit_records
            WHERE subject_id = $1
                AND recorded_at >= $2
            ORDER BY recorded_at DESC, sequence DESC
            "#,
        )
        .bind(subject_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list audit records for subject '{subject_id}': {error}"
            ))
        })?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}

fn map_append_error(error: sqlx::Error, run_id: RunId, action_id: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!(
            "action '{action_id}' is already recorded for run {run_id}"
        ));
    }

    AppError::Internal(format!(
        "failed to append action '{action_id}' for run {run_id}: {error}"
    ))
}
