use std::sync::Arc;
use std::time::Duration;

use adtune_core::{AppError, AppResult, ErrorKind, RunId};
use adtune_domain::{
    Action, ActionDetail, ActionKind, ActionOutcome, CreativeStatus, OutcomeReason,
};
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::optimization_ports::{AdsPlatform, AuditLog, AuditRecord};

mod idempotency;
mod retry;
mod throttle;

#[cfg(test)]
mod tests;

pub(crate) use idempotency::idempotency_key;
use idempotency::PriorState;
pub use retry::RetryPolicy;
use throttle::Throttle;

/// Concurrency and retry settings for one executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Actions executed concurrently.
    pub max_in_flight: usize,
    /// Minimum spacing between outbound platform request starts.
    pub min_request_interval: Duration,
    /// Backoff for transient failures.
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 4,
            min_request_interval: Duration::from_millis(200),
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-run execution parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Run identifier shared by all audit records.
    pub run_id: RunId,
    /// Suppress mutating platform calls.
    pub dry_run: bool,
    /// Oldest audit record consulted for idempotency.
    pub idempotency_since: DateTime<Utc>,
}

/// Applies proposed actions to the ads platform and records them in the audit log.
#[derive(Clone)]
pub struct ActionExecutor {
    platform: Arc<dyn AdsPlatform>,
    audit_log: Arc<dyn AuditLog>,
    throttle: Arc<Throttle>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    /// Creates an executor.
    #[must_use]
    pub fn new(
        platform: Arc<dyn AdsPlatform>,
        audit_log: Arc<dyn AuditLog>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            platform,
            audit_log,
            throttle: Arc::new(Throttle::new(config.min_request_interval)),
            config: ExecutorConfig {
                max_in_flight: config.max_in_flight.max(1),
                ..config
            },
        }
    }

    /// Executes every action and appends all of them to the audit log.
    ///
    /// Failures are isolated per action and recorded on it. The returned
    /// actions keep the input order and none is left pending. The only
    /// error returned is `AppError::AuditWrite`, after which the run must
    /// be treated as failed.
    pub async fn execute(
        &self,
        context: ExecutionContext,
        actions: Vec<Action>,
    ) -> AppResult<Vec<Action>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut slots: Vec<Option<Action>> = vec![None; actions.len()];
        let mut tasks = JoinSet::new();

        for (index, action) in actions.iter().cloned().enumerate() {
            let executor = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                (index, executor.execute_one(&context, action).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, action)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(action);
                    }
                }
                Err(error) => warn!(run_id = %context.run_id, error = %error, "action task aborted"),
            }
        }

        let finished: Vec<Action> = slots
            .into_iter()
            .zip(actions)
            .map(|(finished, original)| {
                finished.unwrap_or_else(|| {
                    let mut aborted = original;
                    if let Err(error) = aborted.record_failure(
                        0,
                        ErrorKind::Internal,
                        "action task aborted before completion",
                    ) {
                        warn!(
                            run_id = %context.run_id,
                            action_id = aborted.action_id(),
                            error = %error,
                            "aborted action outcome could not be recorded"
                        );
                    }
                    aborted
                })
            })
            .collect();

        self.audit_log
            .append(context.run_id, &finished)
            .await
            .map_err(|error| match error {
                AppError::AuditWrite(_) => error,
                other => AppError::AuditWrite(other.to_string()),
            })?;

        Ok(finished)
    }

    async fn execute_one(&self, context: &ExecutionContext, mut action: Action) -> Action {
        if let Err(error) = self.settle(context, &mut action).await {
            // Only reachable when the action was not pending, which the engine never emits.
            warn!(
                run_id = %context.run_id,
                action_id = action.action_id(),
                error = %error,
                "action outcome could not be recorded"
            );
        }

        info!(
            run_id = %context.run_id,
            action_id = action.action_id(),
            outcome = action.outcome().as_str(),
            attempts = action.attempts(),
            "action settled"
        );
        action
    }

    async fn settle(&self, context: &ExecutionContext, action: &mut Action) -> AppResult<()> {
        if action.kind() == ActionKind::Noop {
            return action.record_skipped(OutcomeReason::NoOperation);
        }

        match self.prior_state(context, action).await {
            Ok(PriorState::AlreadyApplied) => {
                return action.record_skipped(OutcomeReason::AlreadyApplied);
            }
            Ok(PriorState::NotApplied) => {}
            Err(error) => {
                return action.record_failure(
                    0,
                    error.kind(),
                    format!("idempotency check failed: {error}"),
                );
            }
        }

        if context.dry_run {
            return action.record_skipped(OutcomeReason::DryRun);
        }

        let key = idempotency_key(action);
        let mut attempt = 0_u8;
        loop {
            attempt = attempt.saturating_add(1);
            self.throttle.acquire().await;

            match self.apply(action, key.as_str()).await {
                Ok(reference) => return action.record_success(attempt, reference),
                Err(error) if error.is_retryable() && attempt < self.config.retry.max_attempts() => {
                    let delay = self.config.retry.delay_after(attempt);
                    warn!(
                        run_id = %context.run_id,
                        action_id = action.action_id(),
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "transient platform failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return action.record_failure(attempt, error.kind(), error.to_string());
                }
            }
        }
    }

    async fn apply(&self, action: &Action, idempotency_key: &str) -> AppResult<Option<String>> {
        let subject_id = action.subject_id().as_str();
        match (action.kind(), action.detail()) {
            (ActionKind::Pause, _) => {
                self.platform.pause(subject_id, idempotency_key).await?;
                Ok(None)
            }
            (ActionKind::Scale, ActionDetail::Variation { patch }) => {
                let created = self
                    .platform
                    .duplicate_with_variation(subject_id, patch, idempotency_key)
                    .await?;
                Ok(Some(created))
            }
            (ActionKind::AdjustBid, ActionDetail::Bid { proposed_bid, .. }) => {
                self.platform
                    .set_bid(subject_id, *proposed_bid, idempotency_key)
                    .await?;
                Ok(None)
            }
            (kind, _) => Err(AppError::Validation(format!(
                "action '{}' of kind {} cannot be applied",
                action.action_id(),
                kind.as_str()
            ))),
        }
    }
}
