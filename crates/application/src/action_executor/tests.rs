use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;

use adtune_core::{AppError, AppResult, ErrorKind, RunId};
use adtune_domain::{
    Action, ActionDetail, ActionInput, ActionKind, ActionOutcome, ActionReason, BidSource,
    ContentPatch, CreativeStatus, OutcomeReason, SubjectKind,
};

use crate::optimization_ports::{AdsPlatform, AuditLog, AuditRecord};

use super::{ActionExecutor, ExecutionContext, ExecutorConfig, RetryPolicy, idempotency_key};

#[derive(Debug, Clone, Copy)]
enum Failure {
    Transient,
    Unauthorized,
    Unavailable,
    Panic,
}

impl Failure {
    fn into_error(self) -> AppError {
        match self {
            Self::Transient => AppError::Transient("platform returned 503".to_owned()),
            Self::Unauthorized => AppError::Unauthorized("platform returned 401".to_owned()),
            Self::Unavailable => AppError::Transient("connection reset".to_owned()),
            Self::Panic => AppError::Internal("client panicked".to_owned()),
        }
    }
}

#[derive(Default)]
struct FakePlatform {
    statuses: Mutex<HashMap<String, CreativeStatus>>,
    status_failures: Mutex<HashMap<String, Failure>>,
    failures: Mutex<HashMap<String, VecDeque<Failure>>>,
    mutations: Mutex<Vec<String>>,
    idempotency_keys: Mutex<Vec<String>>,
}

impl FakePlatform {
    async fn with_status(self, subject_id: &str, status: CreativeStatus) -> Self {
        self.statuses
            .lock()
            .await
            .insert(subject_id.to_owned(), status);
        self
    }

    async fn failing(self, subject_id: &str, failures: &[Failure]) -> Self {
        self.failures
            .lock()
            .await
            .insert(subject_id.to_owned(), failures.iter().copied().collect());
        self
    }

    async fn mutate(&self, call: String, subject_id: &str, key: &str) -> AppResult<()> {
        self.mutations.lock().await.push(call);
        self.idempotency_keys.lock().await.push(key.to_owned());
        let next_failure = self
            .failures
            .lock()
            .await
            .get_mut(subject_id)
            .and_then(VecDeque::pop_front);
        match next_failure {
            Some(Failure::Panic) => panic!("platform client panicked for {subject_id}"),
            Some(failure) => Err(failure.into_error()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AdsPlatform for FakePlatform {
    async fn pause(&self, creative_id: &str, idempotency_key: &str) -> AppResult<()> {
        self.mutate(format!("pause:{creative_id}"), creative_id, idempotency_key)
            .await
    }

    async fn duplicate_with_variation(
        &self,
        creative_id: &str,
        patch: &ContentPatch,
        idempotency_key: &str,
    ) -> AppResult<String> {
        self.mutate(
            format!("duplicate:{creative_id}:{}", patch.variant_label),
            creative_id,
            idempotency_key,
        )
        .await?;
        Ok(format!("{creative_id}-copy"))
    }

    async fn set_bid(&self, campaign_id: &str, amount: f64, idempotency_key: &str) -> AppResult<()> {
        self.mutate(format!("bid:{campaign_id}:{amount}"), campaign_id, idempotency_key)
            .await
    }

    async fn test_token(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_status(&self, subject_id: &str) -> AppResult<CreativeStatus> {
        if let Some(failure) = self.status_failures.lock().await.get(subject_id) {
            return Err(failure.into_error());
        }
        Ok(self
            .statuses
            .lock()
            .await
            .get(subject_id)
            .copied()
            .unwrap_or(CreativeStatus::Active))
    }
}

#[derive(Default)]
struct FakeAuditLog {
    records: Mutex<Vec<AuditRecord>>,
    fail_append: bool,
}

impl FakeAuditLog {
    async fn seeded(actions: Vec<Action>) -> Self {
        let audit_log = Self::default();
        let recorded_at = now() - chrono::Duration::days(1);
        let mut records = audit_log.records.lock().await;
        for (sequence, action) in actions.into_iter().enumerate() {
            records.push(AuditRecord {
                run_id: RunId::new(),
                sequence: u32::try_from(sequence).unwrap_or(u32::MAX),
                recorded_at,
                action,
            });
        }
        drop(records);
        audit_log
    }
}

#[async_trait]
impl AuditLog for FakeAuditLog {
    async fn append(&self, run_id: RunId, actions: &[Action]) -> AppResult<()> {
        if self.fail_append {
            return Err(AppError::Internal("disk full".to_owned()));
        }
        let mut records = self.records.lock().await;
        for (sequence, action) in actions.iter().enumerate() {
            records.push(AuditRecord {
                run_id,
                sequence: u32::try_from(sequence).unwrap_or(u32::MAX),
                recorded_at: now(),
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
        let mut records: Vec<AuditRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|record| {
                record.action.subject_id().as_str() == subject_id && record.recorded_at >= since
            })
            .cloned()
            .collect();
        records.reverse();
        Ok(records)
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 17, 6, 0, 0)
        .single()
        .unwrap_or_else(|| unreachable!())
}

fn context(dry_run: bool) -> ExecutionContext {
    ExecutionContext {
        run_id: RunId::new(),
        dry_run,
        idempotency_since: now() - chrono::Duration::days(7),
    }
}

fn executor(platform: Arc<FakePlatform>, audit_log: Arc<FakeAuditLog>) -> ActionExecutor {
    ActionExecutor::new(
        platform,
        audit_log,
        ExecutorConfig {
            max_in_flight: 2,
            min_request_interval: Duration::ZERO,
            retry: RetryPolicy::immediate(3),
        },
    )
}

fn pending(subject_id: &str, kind: ActionKind) -> Action {
    let (subject_kind, reason, detail) = match kind {
        ActionKind::Pause => (SubjectKind::Creative, ActionReason::LowCtr, ActionDetail::None),
        ActionKind::Scale => (
            SubjectKind::Creative,
            ActionReason::HighCtr,
            ActionDetail::Variation {
                patch: ContentPatch::labelled(format!("{subject_id}-scale")),
            },
        ),
        ActionKind::AdjustBid => (
            SubjectKind::Campaign,
            ActionReason::BidOffTarget,
            ActionDetail::Bid {
                current_bid: 5.0,
                proposed_bid: 6.5,
                source: BidSource::Heuristic,
            },
        ),
        ActionKind::Noop => (
            SubjectKind::Creative,
            ActionReason::WithinBounds,
            ActionDetail::None,
        ),
    };

    Action::pending(ActionInput {
        subject_id: subject_id.to_owned(),
        subject_kind,
        campaign_id: if subject_kind == SubjectKind::Campaign {
            subject_id.to_owned()
        } else {
            "campaign-1".to_owned()
        },
        kind,
        reason,
        detail,
        proposed_at: now(),
    })
    .unwrap_or_else(|_| unreachable!())
}

fn succeeded(mut action: Action) -> Action {
    let _ = action.record_success(1, None);
    action
}

#[tokio::test]
async fn pause_against_paused_creative_is_skipped_without_mutation() {
    let platform = Arc::new(
        FakePlatform::default()
            .with_status("creative-1", CreativeStatus::Paused)
            .await,
    );
    let audit_log = Arc::new(FakeAuditLog::default());
    let executor = executor(Arc::clone(&platform), Arc::clone(&audit_log));

    let result = executor
        .execute(context(false), vec![pending("creative-1", ActionKind::Pause)])
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert_eq!(actions[0].outcome(), ActionOutcome::Skipped);
    assert_eq!(actions[0].outcome_reason(), Some(OutcomeReason::AlreadyApplied));
    assert!(platform.mutations.lock().await.is_empty());
    assert_eq!(audit_log.records.lock().await.len(), 1);
}

#[tokio::test]
async fn auth_failure_is_isolated_to_its_action() {
    let platform = Arc::new(
        FakePlatform::default()
            .failing("creative-2", &[Failure::Unauthorized])
            .await,
    );
    let audit_log = Arc::new(FakeAuditLog::default());
    let executor = executor(Arc::clone(&platform), Arc::clone(&audit_log));

    let result = executor
        .execute(
            context(false),
            vec![
                pending("creative-1", ActionKind::Pause),
                pending("creative-2", ActionKind::Pause),
                pending("creative-3", ActionKind::Pause),
            ],
        )
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    let outcomes: Vec<ActionOutcome> = actions.iter().map(Action::outcome).collect();
    assert_eq!(
        outcomes,
        vec![
            ActionOutcome::Success,
            ActionOutcome::Failure,
            ActionOutcome::Success
        ]
    );
    assert_eq!(actions[1].attempts(), 1);
    assert_eq!(actions[1].failure().map(|failure| failure.kind), Some(ErrorKind::Auth));
    assert_eq!(platform.mutations.lock().await.len(), 3);
    assert_eq!(audit_log.records.lock().await.len(), 3);
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let platform = Arc::new(
        FakePlatform::default()
            .failing("campaign-1", &[Failure::Transient, Failure::Unavailable])
            .await,
    );
    let executor = executor(Arc::clone(&platform), Arc::new(FakeAuditLog::default()));

    let result = executor
        .execute(context(false), vec![pending("campaign-1", ActionKind::AdjustBid)])
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert_eq!(actions[0].outcome(), ActionOutcome::Success);
    assert_eq!(actions[0].attempts(), 3);

    // Every retry reuses the same idempotency key.
    let keys = platform.idempotency_keys.lock().await;
    assert_eq!(keys.len(), 3);
    assert!(keys.iter().all(|key| key == &keys[0]));
}

#[tokio::test]
async fn transient_failures_exhaust_the_attempt_budget() {
    let platform = Arc::new(
        FakePlatform::default()
            .failing(
                "creative-1",
                &[Failure::Transient, Failure::Transient, Failure::Transient],
            )
            .await,
    );
    let executor = executor(Arc::clone(&platform), Arc::new(FakeAuditLog::default()));

    let result = executor
        .execute(context(false), vec![pending("creative-1", ActionKind::Pause)])
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert_eq!(actions[0].outcome(), ActionOutcome::Failure);
    assert_eq!(actions[0].attempts(), 3);
    assert_eq!(
        actions[0].failure().map(|failure| failure.kind),
        Some(ErrorKind::TransientPlatform)
    );
}

#[tokio::test]
async fn dry_run_issues_no_mutating_calls() {
    let platform = Arc::new(FakePlatform::default());
    let audit_log = Arc::new(FakeAuditLog::default());
    let executor = executor(Arc::clone(&platform), Arc::clone(&audit_log));

    let result = executor
        .execute(
            context(true),
            vec![
                pending("creative-1", ActionKind::Pause),
                pending("creative-2", ActionKind::Scale),
                pending("campaign-1", ActionKind::AdjustBid),
                pending("creative-3", ActionKind::Noop),
            ],
        )
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert!(platform.mutations.lock().await.is_empty());
    let reasons: Vec<Option<OutcomeReason>> =
        actions.iter().map(Action::outcome_reason).collect();
    assert_eq!(
        reasons,
        vec![
            Some(OutcomeReason::DryRun),
            Some(OutcomeReason::DryRun),
            Some(OutcomeReason::DryRun),
            Some(OutcomeReason::NoOperation),
        ]
    );
    assert_eq!(audit_log.records.lock().await.len(), 4);
}

#[tokio::test]
async fn scale_already_recorded_in_the_lookback_is_skipped() {
    let platform = Arc::new(FakePlatform::default());
    let audit_log = Arc::new(
        FakeAuditLog::seeded(vec![succeeded(pending("creative-1", ActionKind::Scale))]).await,
    );
    let executor = executor(Arc::clone(&platform), audit_log);

    let result = executor
        .execute(context(false), vec![pending("creative-1", ActionKind::Scale)])
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert_eq!(actions[0].outcome_reason(), Some(OutcomeReason::AlreadyApplied));
    assert!(platform.mutations.lock().await.is_empty());
}

#[tokio::test]
async fn repeated_bid_is_skipped_but_a_new_amount_is_sent() {
    let platform = Arc::new(FakePlatform::default());
    let audit_log = Arc::new(
        FakeAuditLog::seeded(vec![succeeded(pending("campaign-1", ActionKind::AdjustBid))]).await,
    );
    let executor = executor(Arc::clone(&platform), audit_log);

    let result = executor
        .execute(context(false), vec![pending("campaign-1", ActionKind::AdjustBid)])
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());
    assert_eq!(actions[0].outcome_reason(), Some(OutcomeReason::AlreadyApplied));

    let different_bid = Action::pending(ActionInput {
        subject_id: "campaign-1".to_owned(),
        subject_kind: SubjectKind::Campaign,
        campaign_id: "campaign-1".to_owned(),
        kind: ActionKind::AdjustBid,
        reason: ActionReason::BidOffTarget,
        detail: ActionDetail::Bid {
            current_bid: 6.5,
            proposed_bid: 7.25,
            source: BidSource::ScoringService,
        },
        proposed_at: now(),
    })
    .unwrap_or_else(|_| unreachable!());
    let result = executor.execute(context(false), vec![different_bid]).await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());
    assert_eq!(actions[0].outcome(), ActionOutcome::Success);
    assert_eq!(
        platform.mutations.lock().await.as_slice(),
        ["bid:campaign-1:7.25".to_owned()]
    );
}

#[tokio::test]
async fn pause_falls_back_to_audit_when_status_read_fails() {
    let platform = Arc::new(FakePlatform::default());
    platform
        .status_failures
        .lock()
        .await
        .insert("creative-1".to_owned(), Failure::Unavailable);
    let audit_log = Arc::new(
        FakeAuditLog::seeded(vec![succeeded(pending("creative-1", ActionKind::Pause))]).await,
    );
    let executor = executor(Arc::clone(&platform), audit_log);

    let result = executor
        .execute(
            context(false),
            vec![
                pending("creative-1", ActionKind::Pause),
                pending("creative-2", ActionKind::Pause),
            ],
        )
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert_eq!(actions[0].outcome_reason(), Some(OutcomeReason::AlreadyApplied));
    assert_eq!(actions[1].outcome(), ActionOutcome::Success);
    assert_eq!(
        platform.mutations.lock().await.as_slice(),
        ["pause:creative-2".to_owned()]
    );
}

#[tokio::test]
async fn scale_records_the_new_creative_reference() {
    let platform = Arc::new(FakePlatform::default());
    let executor = executor(Arc::clone(&platform), Arc::new(FakeAuditLog::default()));

    let result = executor
        .execute(context(false), vec![pending("creative-1", ActionKind::Scale)])
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert_eq!(actions[0].platform_reference(), Some("creative-1-copy"));
    assert_eq!(
        platform.mutations.lock().await.as_slice(),
        ["duplicate:creative-1:creative-1-scale".to_owned()]
    );
}

#[tokio::test]
async fn audit_write_failure_is_fatal() {
    let audit_log = Arc::new(FakeAuditLog {
        fail_append: true,
        ..FakeAuditLog::default()
    });
    let executor = executor(Arc::new(FakePlatform::default()), audit_log);

    let result = executor
        .execute(context(false), vec![pending("creative-1", ActionKind::Noop)])
        .await;
    assert!(matches!(result, Err(AppError::AuditWrite(_))));
}

#[test]
fn idempotency_keys_are_stable_across_runs_of_the_same_day() {
    let pause = pending("creative-1", ActionKind::Pause);
    let key = idempotency_key(&pause);
    assert_eq!(key.len(), 64);
    assert_eq!(key, idempotency_key(&pending("creative-1", ActionKind::Pause)));
    assert_ne!(key, idempotency_key(&pending("creative-2", ActionKind::Pause)));

    let next_day = Action::pending(ActionInput {
        subject_id: "creative-1".to_owned(),
        subject_kind: SubjectKind::Creative,
        campaign_id: "campaign-1".to_owned(),
        kind: ActionKind::Pause,
        reason: ActionReason::LowCtr,
        detail: ActionDetail::None,
        proposed_at: now() + chrono::Duration::days(1),
    })
    .unwrap_or_else(|_| unreachable!());
    assert_ne!(key, idempotency_key(&next_day));
}

#[tokio::test]
async fn rerun_after_lost_audit_reuses_the_platform_key() {
    let platform = Arc::new(FakePlatform::default());
    let lost_audit = Arc::new(FakeAuditLog {
        fail_append: true,
        ..FakeAuditLog::default()
    });
    let first = executor(Arc::clone(&platform), lost_audit)
        .execute(context(false), vec![pending("creative-9", ActionKind::Scale)])
        .await;
    assert!(matches!(first, Err(AppError::AuditWrite(_))));

    let second = executor(Arc::clone(&platform), Arc::new(FakeAuditLog::default()))
        .execute(context(false), vec![pending("creative-9", ActionKind::Scale)])
        .await;
    assert!(second.is_ok());

    let keys = platform.idempotency_keys.lock().await;
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0], keys[1]);
}

#[tokio::test]
async fn aborted_task_is_recorded_as_an_internal_failure() {
    let platform = Arc::new(
        FakePlatform::default()
            .failing("creative-2", &[Failure::Panic])
            .await,
    );
    let audit_log = Arc::new(FakeAuditLog::default());
    let executor = executor(Arc::clone(&platform), Arc::clone(&audit_log));

    let result = executor
        .execute(
            context(false),
            vec![
                pending("creative-1", ActionKind::Pause),
                pending("creative-2", ActionKind::Pause),
            ],
        )
        .await;
    assert!(result.is_ok());
    let actions = result.unwrap_or_else(|_| unreachable!());

    assert_eq!(actions[0].outcome(), ActionOutcome::Success);
    assert_eq!(actions[1].outcome(), ActionOutcome::Failure);
    assert_eq!(
        actions[1].failure().map(|failure| failure.kind),
        Some(ErrorKind::Internal)
    );
    assert_eq!(audit_log.records.lock().await.len(), 2);
}
