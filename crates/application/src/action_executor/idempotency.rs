use super::*;

const BID_EQUALITY_TOLERANCE: f64 = 0.005;

/// Result of checking whether an action is already reflected on the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum PriorState {
    AlreadyApplied,
    NotApplied,
}

impl ActionExecutor {
    /// Decides whether the platform already holds the action's target state.
    ///
    /// Only reads: a status read for pauses, the audit log for every kind.
    pub(super) async fn prior_state(
        &self,
        context: &ExecutionContext,
        action: &Action,
    ) -> AppResult<PriorState> {
        let subject_id = action.subject_id().as_str();
        match action.kind() {
            ActionKind::Noop => Ok(PriorState::NotApplied),
            ActionKind::Pause => {
                self.throttle.acquire().await;
                match self.platform.get_status(subject_id).await {
                    Ok(CreativeStatus::Paused) => Ok(PriorState::AlreadyApplied),
                    Ok(CreativeStatus::Active) => Ok(PriorState::NotApplied),
                    Err(error) => {
                        warn!(
                            run_id = %context.run_id,
                            subject_id,
                            error = %error,
                            "status read failed, falling back to audit log"
                        );
                        let latest = self
                            .latest_success(context, subject_id, ActionKind::Pause)
                            .await;
                        match latest {
                            Ok(Some(_)) => Ok(PriorState::AlreadyApplied),
                            Ok(None) | Err(_) => Ok(PriorState::NotApplied),
                        }
                    }
                }
            }
            ActionKind::Scale => {
                let latest = self
                    .latest_success(context, subject_id, ActionKind::Scale)
                    .await?;
                Ok(if latest.is_some() {
                    PriorState::AlreadyApplied
                } else {
                    PriorState::NotApplied
                })
            }
            ActionKind::AdjustBid => {
                let latest = self
                    .latest_success(context, subject_id, ActionKind::AdjustBid)
                    .await
                    .unwrap_or_else(|error| {
                        warn!(
                            run_id = %context.run_id,
                            subject_id,
                            error = %error,
                            "audit read failed, bid will be sent"
                        );
                        None
                    });
                let previous_bid = latest.and_then(|record| record.action.proposed_bid());
                let same_bid = match (previous_bid, action.proposed_bid()) {
                    (Some(previous), Some(proposed)) => {
                        (previous - proposed).abs() < BID_EQUALITY_TOLERANCE
                    }
                    _ => false,
                };
                Ok(if same_bid {
                    PriorState::AlreadyApplied
                } else {
                    PriorState::NotApplied
                })
            }
        }
    }

    /// Returns the newest successful record of `kind` for the subject.
    async fn latest_success(
        &self,
        context: &ExecutionContext,
        subject_id: &str,
        kind: ActionKind,
    ) -> AppResult<Option<AuditRecord>> {
        let records = self
            .audit_log
            .list_recent(subject_id, context.idempotency_since)
            .await?;

        Ok(records.into_iter().find(|record| {
            record.action.kind() == kind && record.action.outcome() == ActionOutcome::Success
        }))
    }
}

/// Derives the platform idempotency key for an action.
///
/// The key depends on the action and its decision day only, so a re-run
/// of a killed run sends the same key and the platform drops the repeat.
/// Bid changes also key on the amount, letting a new bid through.
pub(crate) fn idempotency_key(action: &Action) -> String {
    let mut material = format!(
        "{}:{}",
        action.action_id(),
        action.proposed_at().date_naive()
    );
    if let Some(proposed_bid) = action.proposed_bid() {
        material.push_str(&format!(":{proposed_bid:.2}"));
    }
    crate::digest::sha256_hex(material.as_bytes())
}
