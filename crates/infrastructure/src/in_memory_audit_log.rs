use std::collections::HashSet;

use async_trait::async_trait;
use adtune_application::{AuditLog, AuditRecord};
use adtune_core::{AppError, AppResult, RunId};
use adtune_domain::Action;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// In-memory audit log for dry runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    /// Creates an empty audit log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record in append order.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, run_id: RunId, actions: &[Action]) -> AppResult<()> {
        let mut records = self.records.write().await;
        let mut seen: HashSet<&str> = records
            .iter()
            .filter(|record| record.run_id == run_id)
            .map(|record| record.action.action_id())
            .collect();

        for action in actions {
            if !seen.insert(action.action_id()) {
                return Err(AppError::Conflict(format!(
                    "action '{}' is already recorded for run {run_id}",
                    action.action_id()
                )));
            }
        }
        drop(seen);

        let recorded_at = Utc::now();
        for (sequence, action) in actions.iter().enumerate() {
            records.push(AuditRecord {
                run_id,
                sequence: u32::try_from(sequence).map_err(|_| {
                    AppError::Validation("a run cannot record more than u32::MAX actions".to_owned())
                })?,
                recorded_at,
                action: action.clone(),
            });
        }

        Ok(())
    }

    async fn list_recent(
        &self,
        subject_id: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<AuditRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|record| {
                record.recorded_at >= since && record.action.subject_id().as_str() == subject_id
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use adtune_application::AuditLog;
    use adtune_core::RunId;
    use adtune_domain::{Action, ActionDetail, ActionInput, ActionKind, ActionReason, SubjectKind};
    use chrono::{Duration, Utc};

    use super::InMemoryAuditLog;

    fn action(subject_id: &str) -> Action {
        Action::pending(ActionInput {
            subject_id: subject_id.to_owned(),
            subject_kind: SubjectKind::Creative,
            campaign_id: "campaign-1".to_owned(),
            kind: ActionKind::Pause,
            reason: ActionReason::LowCtr,
            detail: ActionDetail::None,
            proposed_at: Utc::now(),
        })
        .unwrap_or_else(|_| unreachable!())
    }

    #[tokio::test]
    async fn records_are_listed_newest_first_per_subject() {
        let audit_log = InMemoryAuditLog::new();
        let first_run = RunId::new();
        let second_run = RunId::new();

        assert!(audit_log.append(first_run, &[action("creative-1"), action("creative-2")]).await.is_ok());
        assert!(audit_log.append(second_run, &[action("creative-1")]).await.is_ok());

        let records = audit_log
            .list_recent("creative-1", Utc::now() - Duration::days(1))
            .await;
        assert!(records.is_ok());
        let records = records.unwrap_or_else(|_| unreachable!());
        let runs: Vec<RunId> = records.iter().map(|record| record.run_id).collect();
        assert_eq!(runs, vec![second_run, first_run]);
    }

    #[tokio::test]
    async fn an_action_is_recorded_once_per_run() {
        let audit_log = InMemoryAuditLog::new();
        let run_id = RunId::new();

        assert!(audit_log.append(run_id, &[action("creative-1")]).await.is_ok());
        assert!(audit_log.append(run_id, &[action("creative-1")]).await.is_err());
        assert!(
            audit_log
                .append(run_id, &[action("creative-2"), action("creative-2")])
                .await
                .is_err()
        );
        assert_eq!(audit_log.records().await.len(), 1);
    }
}
