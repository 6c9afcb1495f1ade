use async_trait::async_trait;
use adtune_core::{AppResult, RunId};
use adtune_domain::Action;
use chrono::{DateTime, Utc};

/// Immutable audit entry for one action of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    /// Run that executed the action.
    pub run_id: RunId,
    /// Position of the action in the run's proposal order.
    pub sequence: u32,
    /// Append timestamp.
    pub recorded_at: DateTime<Utc>,
    /// Action with its final outcome.
    pub action: Action,
}

/// Port for the durable append-only audit log.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Appends every action of a run in one atomic write.
    ///
    /// Appending the same `(run_id, action_id)` twice must fail rather than
    /// produce a second record.
    async fn append(&self, run_id: RunId, actions: &[Action]) -> AppResult<()>;

    /// Lists records for a subject written at or after `since`, newest first.
    async fn list_recent(
        &self,
        subject_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<AuditRecord>>;
}
