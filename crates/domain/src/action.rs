use adtune_core::{AppError, AppResult, ErrorKind, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::creative::ContentPatch;
use crate::performance::SubjectKind;

/// Mutation proposed for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    /// Stop delivery of a creative.
    Pause,
    /// Duplicate a winning creative as a content variation.
    Scale,
    /// Change a campaign bid.
    AdjustBid,
    /// Leave the subject unchanged.
    Noop,
}

impl ActionKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "PAUSE",
            Self::Scale => "SCALE",
            Self::AdjustBid => "ADJUST_BID",
            Self::Noop => "NOOP",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "PAUSE" => Ok(Self::Pause),
            "SCALE" => Ok(Self::Scale),
            "ADJUST_BID" => Ok(Self::AdjustBid),
            "NOOP" => Ok(Self::Noop),
            _ => Err(AppError::Validation(format!(
                "unknown action kind '{value}'"
            ))),
        }
    }

    /// Returns true when executing the action mutates platform state.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Noop)
    }
}

/// Tag explaining why the decision engine proposed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionReason {
    /// Too few clicks for reliable CTR/CPC estimates.
    InsufficientSample,
    /// Cost per click above the configured ceiling.
    CpcExceeded,
    /// Click-through rate below the configured floor.
    LowCtr,
    /// Click-through rate above the scale threshold.
    HighCtr,
    /// Every metric inside policy bounds.
    WithinBounds,
    /// Campaign CPC is further from its target bid than the change threshold.
    BidOffTarget,
}

impl ActionReason {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientSample => "insufficient_sample",
            Self::CpcExceeded => "cpc_exceeded",
            Self::LowCtr => "low_ctr",
            Self::HighCtr => "high_ctr",
            Self::WithinBounds => "within_bounds",
            Self::BidOffTarget => "bid_off_target",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "insufficient_sample" => Ok(Self::InsufficientSample),
            "cpc_exceeded" => Ok(Self::CpcExceeded),
            "low_ctr" => Ok(Self::LowCtr),
            "high_ctr" => Ok(Self::HighCtr),
            "within_bounds" => Ok(Self::WithinBounds),
            "bid_off_target" => Ok(Self::BidOffTarget),
            _ => Err(AppError::Validation(format!(
                "unknown action reason '{value}'"
            ))),
        }
    }
}

/// Execution status of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionOutcome {
    /// Proposed, not yet executed.
    Pending,
    /// Platform mutation applied.
    Success,
    /// Platform mutation failed.
    Failure,
    /// Deliberately not executed.
    Skipped,
}

impl ActionOutcome {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Skipped => "SKIPPED",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "SUCCESS" => Ok(Self::Success),
            "FAILURE" => Ok(Self::Failure),
            "SKIPPED" => Ok(Self::Skipped),
            _ => Err(AppError::Validation(format!(
                "unknown action outcome '{value}'"
            ))),
        }
    }
}

/// Why an action ended up skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    /// The subject is already in the target state.
    AlreadyApplied,
    /// Dry-run mode suppressed the mutation.
    DryRun,
    /// Nothing to execute for a NOOP.
    NoOperation,
}

impl OutcomeReason {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyApplied => "already_applied",
            Self::DryRun => "dry_run",
            Self::NoOperation => "no_operation",
        }
    }
}

/// Where a proposed bid came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidSource {
    /// Suggested by the external scoring service.
    ScoringService,
    /// Computed by the built-in heuristic.
    Heuristic,
}

impl BidSource {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScoringService => "scoring_service",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Kind-specific parameters of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDetail {
    /// No parameters.
    None,
    /// Variation to create from a winning creative.
    Variation {
        /// Content changes for the duplicate.
        patch: ContentPatch,
    },
    /// Campaign bid change.
    Bid {
        /// Aggregate CPC observed in the lookback window.
        current_bid: f64,
        /// Bid to set.
        proposed_bid: f64,
        /// Origin of the proposed bid.
        source: BidSource,
    },
}

/// Classified failure attached to a failed action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    /// Taxonomy bucket, lets alerting separate bad credentials from bad requests.
    pub kind: ErrorKind,
    /// Human-readable failure detail.
    pub message: String,
}

/// Input payload used to construct a pending action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionInput {
    /// Creative or campaign identifier.
    pub subject_id: String,
    /// Subject kind.
    pub subject_kind: SubjectKind,
    /// Owning campaign.
    pub campaign_id: String,
    /// Proposed mutation.
    pub kind: ActionKind,
    /// Decision tag.
    pub reason: ActionReason,
    /// Kind-specific parameters.
    pub detail: ActionDetail,
    /// Decision timestamp.
    pub proposed_at: DateTime<Utc>,
}

/// One proposed mutation and its execution outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    action_id: String,
    subject_id: NonEmptyString,
    subject_kind: SubjectKind,
    campaign_id: NonEmptyString,
    kind: ActionKind,
    reason: ActionReason,
    detail: ActionDetail,
    proposed_at: DateTime<Utc>,
    outcome: ActionOutcome,
    outcome_reason: Option<OutcomeReason>,
    failure: Option<ActionFailure>,
    attempts: u8,
    platform_reference: Option<String>,
}

impl Action {
    /// Creates a validated pending action.
    pub fn pending(input: ActionInput) -> AppResult<Self> {
        let ActionInput {
            subject_id,
            subject_kind,
            campaign_id,
            kind,
            reason,
            detail,
            proposed_at,
        } = input;

        let subject_id = NonEmptyString::new(subject_id)?;
        let campaign_id = NonEmptyString::new(campaign_id)?;

        let detail_matches = match (kind, &detail) {
            (ActionKind::Scale, ActionDetail::Variation { .. }) => true,
            (ActionKind::AdjustBid, ActionDetail::Bid { proposed_bid, .. }) => {
                proposed_bid.is_finite() && *proposed_bid > 0.0
            }
            (ActionKind::Pause | ActionKind::Noop, ActionDetail::None) => true,
            _ => false,
        };
        if !detail_matches {
            return Err(AppError::Validation(format!(
                "action {} for '{}' has mismatched detail",
                kind.as_str(),
                subject_id.as_str()
            )));
        }

        if kind == ActionKind::Pause && subject_kind != SubjectKind::Creative {
            return Err(AppError::Validation(format!(
                "only creatives can be paused, '{}' is a {}",
                subject_id.as_str(),
                subject_kind.as_str()
            )));
        }

        if kind == ActionKind::AdjustBid && subject_kind != SubjectKind::Campaign {
            return Err(AppError::Validation(format!(
                "bids are set on campaigns, '{}' is a {}",
                subject_id.as_str(),
                subject_kind.as_str()
            )));
        }

        Ok(Self {
            action_id: format!(
                "{}:{}:{}",
                subject_kind.as_str(),
                subject_id.as_str(),
                kind.as_str()
            ),
            subject_id,
            subject_kind,
            campaign_id,
            kind,
            reason,
            detail,
            proposed_at,
            outcome: ActionOutcome::Pending,
            outcome_reason: None,
            failure: None,
            attempts: 0,
            platform_reference: None,
        })
    }

    /// Returns the identifier of this action, unique within one run.
    #[must_use]
    pub fn action_id(&self) -> &str {
        self.action_id.as_str()
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &NonEmptyString {
        &self.subject_id
    }

    /// Returns the subject kind.
    #[must_use]
    pub fn subject_kind(&self) -> SubjectKind {
        self.subject_kind
    }

    /// Returns the owning campaign.
    #[must_use]
    pub fn campaign_id(&self) -> &NonEmptyString {
        &self.campaign_id
    }

    /// Returns the proposed mutation.
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Returns the decision tag.
    #[must_use]
    pub fn reason(&self) -> ActionReason {
        self.reason
    }

    /// Returns kind-specific parameters.
    #[must_use]
    pub fn detail(&self) -> &ActionDetail {
        &self.detail
    }

    /// Returns the decision timestamp.
    #[must_use]
    pub fn proposed_at(&self) -> DateTime<Utc> {
        self.proposed_at
    }

    /// Returns the execution status.
    #[must_use]
    pub fn outcome(&self) -> ActionOutcome {
        self.outcome
    }

    /// Returns why the action was skipped.
    #[must_use]
    pub fn outcome_reason(&self) -> Option<OutcomeReason> {
        self.outcome_reason
    }

    /// Returns the classified failure.
    #[must_use]
    pub fn failure(&self) -> Option<&ActionFailure> {
        self.failure.as_ref()
    }

    /// Returns how many platform calls were attempted.
    #[must_use]
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Returns the platform identifier produced by the action, e.g. a new creative.
    #[must_use]
    pub fn platform_reference(&self) -> Option<&str> {
        self.platform_reference.as_deref()
    }

    /// Returns the proposed bid for bid adjustments.
    #[must_use]
    pub fn proposed_bid(&self) -> Option<f64> {
        match self.detail {
            ActionDetail::Bid { proposed_bid, .. } => Some(proposed_bid),
            _ => None,
        }
    }

    /// Marks the action as applied on the platform.
    pub fn record_success(
        &mut self,
        attempts: u8,
        platform_reference: Option<String>,
    ) -> AppResult<()> {
        self.require_pending()?;
        self.outcome = ActionOutcome::Success;
        self.attempts = attempts;
        self.platform_reference = platform_reference;
        Ok(())
    }

    /// Marks the action as deliberately not executed.
    pub fn record_skipped(&mut self, reason: OutcomeReason) -> AppResult<()> {
        self.require_pending()?;
        self.outcome = ActionOutcome::Skipped;
        self.outcome_reason = Some(reason);
        Ok(())
    }

    /// Marks the action as failed with a classified error.
    pub fn record_failure(
        &mut self,
        attempts: u8,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> AppResult<()> {
        self.require_pending()?;
        self.outcome = ActionOutcome::Failure;
        self.attempts = attempts;
        self.failure = Some(ActionFailure {
            kind,
            message: message.into(),
        });
        Ok(())
    }

    fn require_pending(&self) -> AppResult<()> {
        if self.outcome != ActionOutcome::Pending {
            return Err(AppError::Conflict(format!(
                "action '{}' already finished with outcome {}",
                self.action_id,
                self.outcome.as_str()
            )));
        }

        Ok(())
    }
}
