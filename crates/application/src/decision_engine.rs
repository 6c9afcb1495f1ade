use std::collections::BTreeMap;
use std::fmt::Write as _;

use adtune_core::{AppError, AppResult};
use adtune_domain::{
    Action, ActionDetail, ActionInput, ActionKind, ActionReason, BidDecision, ContentPatch,
    PerformanceRecord, PerformanceWindow, PolicyConfig, SubjectKind, classify_creative,
    propose_bid,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::optimization_ports::{CampaignContext, ContentSuggestion, VariationContext};


/// Metrics row or subject excluded from decisions, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedWindow {
    /// Subject named by the row, `<blank>` when the row had none.
    pub subject_id: String,
    /// Validation failure.
    pub reason: String,
}

/// Validated and aggregated metrics for one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSnapshot {
    creatives: Vec<PerformanceWindow>,
    campaigns: Vec<PerformanceWindow>,
    rejected: Vec<RejectedWindow>,
}

impl MetricsSnapshot {
    /// Returns creative aggregates sorted by subject id.
    #[must_use]
    pub fn creatives(&self) -> &[PerformanceWindow] {
        &self.creatives
    }

    /// Returns campaign aggregates sorted by campaign id.
    #[must_use]
    pub fn campaigns(&self) -> &[PerformanceWindow] {
        &self.campaigns
    }

    /// Returns rows and subjects that failed validation.
    #[must_use]
    pub fn rejected(&self) -> &[RejectedWindow] {
        &self.rejected
    }
}

/// Ordered actions proposed for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionPlan {
    actions: Vec<Action>,
    fingerprint: String,
}

impl DecisionPlan {
    /// Returns pending actions: creatives first, then campaigns, each by subject id.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Consumes the plan and returns its actions.
    #[must_use]
    pub fn into_actions(self) -> Vec<Action> {
        self.actions
    }

    /// Returns a SHA-256 hex digest over action ids, reasons and parameters.
    ///
    /// Two runs over the same metrics and policy share a fingerprint
    /// regardless of when they ran.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        self.fingerprint.as_str()
    }
}

/// External model output gathered before deciding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suggestions {
    /// Scoring-service bids by campaign id.
    pub bids: BTreeMap<String, f64>,
    /// Copy-generator rewrites by creative id.
    pub variations: BTreeMap<String, ContentSuggestion>,
}

/// Pure mapping from performance windows and policy to proposed actions.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    policy: PolicyConfig,
}

impl DecisionEngine {
    /// Creates an engine bound to one run's policy.
    #[must_use]
    pub fn new(policy: PolicyConfig) -> Self {
        Self { policy }
    }

    /// Returns the policy.
    #[must_use]
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Validates raw rows and sums them per subject.
    ///
    /// Campaigns without campaign-level rows are rolled up from their
    /// creatives. A subject whose rows disagree (for example one creative
    /// reported under two campaigns) is rejected as a whole.
    #[must_use]
    pub fn prepare(&self, records: Vec<PerformanceRecord>) -> MetricsSnapshot {
        let mut rejected = Vec::new();
        let mut grouped: BTreeMap<(SubjectKind, String), Vec<PerformanceWindow>> = BTreeMap::new();

        for record in records {
            let subject_id = if record.subject_id.trim().is_empty() {
                "<blank>".to_owned()
            } else {
                record.subject_id.clone()
            };

            match PerformanceWindow::from_record(record) {
                Ok(window) => grouped
                    .entry((window.subject_kind(), subject_id))
                    .or_default()
                    .push(window),
                Err(error) => rejected.push(RejectedWindow {
                    subject_id,
                    reason: error.to_string(),
                }),
            }
        }

        let mut creatives = Vec::new();
        let mut campaigns: BTreeMap<String, PerformanceWindow> = BTreeMap::new();
        for ((kind, subject_id), windows) in grouped {
            let merged = match merge_all(&windows) {
                Ok(merged) => merged,
                Err(error) => {
                    rejected.push(RejectedWindow {
                        subject_id,
                        reason: error.to_string(),
                    });
                    continue;
                }
            };

            match kind {
                SubjectKind::Creative => creatives.push(merged),
                SubjectKind::Campaign => {
                    campaigns.insert(subject_id, merged);
                }
            }
        }

        let mut by_campaign: BTreeMap<&str, Vec<&PerformanceWindow>> = BTreeMap::new();
        for creative in &creatives {
            by_campaign
                .entry(creative.campaign_id().as_str())
                .or_default()
                .push(creative);
        }
        for (campaign_id, members) in by_campaign {
            if campaigns.contains_key(campaign_id) {
                continue;
            }
            match PerformanceWindow::rollup_campaign(members) {
                Ok(rollup) => {
                    campaigns.insert(campaign_id.to_owned(), rollup);
                }
                Err(error) => rejected.push(RejectedWindow {
                    subject_id: campaign_id.to_owned(),
                    reason: error.to_string(),
                }),
            }
        }

        MetricsSnapshot {
            creatives,
            campaigns: campaigns.into_values().collect(),
            rejected,
        }
    }

    /// Returns scoring requests for campaigns with enough clicks for a bid change.
    #[must_use]
    pub fn campaign_contexts(&self, snapshot: &MetricsSnapshot) -> Vec<CampaignContext> {
        snapshot
            .campaigns
            .iter()
            .filter(|campaign| campaign.clicks() >= self.policy.min_sample_size())
            .map(|campaign| CampaignContext {
                campaign_id: campaign.subject_id().as_str().to_owned(),
                lookback_days: self.policy.lookback_days(),
                impressions: campaign.impressions(),
                clicks: campaign.clicks(),
                cost: campaign.cost(),
                conversions: campaign.conversions(),
                ctr_percent: campaign.ctr_percent(),
                cpc: campaign.cpc(),
            })
            .collect()
    }

    /// Returns copy-generator requests for creatives that will be scaled.
    #[must_use]
    pub fn variation_contexts(&self, snapshot: &MetricsSnapshot) -> Vec<VariationContext> {
        snapshot
            .creatives
            .iter()
            .filter(|creative| classify_creative(creative, &self.policy).kind == ActionKind::Scale)
            .map(|creative| VariationContext {
                creative_id: creative.subject_id().as_str().to_owned(),
                campaign_id: creative.campaign_id().as_str().to_owned(),
                lookback_days: self.policy.lookback_days(),
                impressions: creative.impressions(),
                clicks: creative.clicks(),
                conversions: creative.conversions(),
                ctr_percent: creative.ctr_percent(),
                cpc: creative.cpc(),
            })
            .collect()
    }

    /// Proposes one pending action per creative and per campaign.
    ///
    /// Campaigns without a bid suggestion use the heuristic, and scaled
    /// creatives without a variation are duplicated unchanged. Subjects
    /// whose action cannot be built are appended to `rejected`.
    #[must_use]
    pub fn decide(
        &self,
        snapshot: &MetricsSnapshot,
        suggestions: &Suggestions,
        proposed_at: DateTime<Utc>,
    ) -> (DecisionPlan, Vec<RejectedWindow>) {
        let mut actions = Vec::with_capacity(snapshot.creatives.len() + snapshot.campaigns.len());
        let mut rejected = Vec::new();

        for creative in &snapshot.creatives {
            let classification = classify_creative(creative, &self.policy);
            let detail = match classification.kind {
                ActionKind::Scale => ActionDetail::Variation {
                    patch: scale_patch(
                        creative.subject_id().as_str(),
                        suggestions.variations.get(creative.subject_id().as_str()),
                    ),
                },
                _ => ActionDetail::None,
            };
            push_action(
                &mut actions,
                &mut rejected,
                creative,
                classification.kind,
                classification.reason,
                detail,
                proposed_at,
            );
        }

        for campaign in &snapshot.campaigns {
            let suggestion = suggestions.bids.get(campaign.subject_id().as_str()).copied();
            let (kind, reason, detail) = match propose_bid(campaign, suggestion, &self.policy) {
                BidDecision::InsufficientSample => (
                    ActionKind::Noop,
                    ActionReason::InsufficientSample,
                    ActionDetail::None,
                ),
                BidDecision::WithinBounds(_) => (
                    ActionKind::Noop,
                    ActionReason::WithinBounds,
                    ActionDetail::None,
                ),
                BidDecision::Adjust(proposal) => (
                    ActionKind::AdjustBid,
                    ActionReason::BidOffTarget,
                    ActionDetail::Bid {
                        current_bid: proposal.current_bid,
                        proposed_bid: proposal.proposed_bid,
                        source: proposal.source,
                    },
                ),
            };
            push_action(
                &mut actions,
                &mut rejected,
                campaign,
                kind,
                reason,
                detail,
                proposed_at,
            );
        }

        let fingerprint = fingerprint(&actions);
        (
            DecisionPlan {
                actions,
                fingerprint,
            },
            rejected,
        )
    }
}

fn scale_patch(creative_id: &str, suggestion: Option<&ContentSuggestion>) -> ContentPatch {
    let mut patch = ContentPatch::labelled(format!("{creative_id}-scale"));
    let Some(suggestion) = suggestion else {
        return patch;
    };

    let present = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
    };
    patch.headline = present(&suggestion.headline);
    patch.description = present(&suggestion.description);
    patch.call_to_action = present(&suggestion.call_to_action);
    patch
}

fn merge_all(windows: &[PerformanceWindow]) -> AppResult<PerformanceWindow> {
    let mut iter = windows.iter();
    let Some(first) = iter.next() else {
        return Err(AppError::Internal(
            "subject group without windows".to_owned(),
        ));
    };

    iter.try_fold(first.clone(), |merged, window| merged.merge(window))
}

fn push_action(
    actions: &mut Vec<Action>,
    rejected: &mut Vec<RejectedWindow>,
    window: &PerformanceWindow,
    kind: ActionKind,
    reason: ActionReason,
    detail: ActionDetail,
    proposed_at: DateTime<Utc>,
) {
    let action = Action::pending(ActionInput {
        subject_id: window.subject_id().as_str().to_owned(),
        subject_kind: window.subject_kind(),
        campaign_id: window.campaign_id().as_str().to_owned(),
        kind,
        reason,
        detail,
        proposed_at,
    });

    match action {
        Ok(action) => actions.push(action),
        Err(error) => rejected.push(RejectedWindow {
            subject_id: window.subject_id().as_str().to_owned(),
            reason: error.to_string(),
        }),
    }
}

fn fingerprint(actions: &[Action]) -> String {
    let mut canonical = String::new();
    for action in actions {
        let detail = serde_json::to_string(action.detail()).unwrap_or_default();
        let _ = writeln!(
            canonical,
            "{}|{}|{detail}",
            action.action_id(),
            action.reason().as_str()
        );
    }

    crate::digest::sha256_hex(canonical.as_bytes())
}
