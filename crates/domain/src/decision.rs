//! Pure decision rules applied to validated performance windows.

use serde::{Deserialize, Serialize};

use crate::action::{ActionKind, ActionReason, BidSource};
use crate::performance::PerformanceWindow;
use crate::policy::PolicyConfig;

/// Largest bid increase the heuristic proposes in one run, as a multiple of current CPC.
pub const MAX_BID_INCREASE_RATIO: f64 = 1.5;

/// Largest bid decrease the heuristic proposes in one run, as a multiple of current CPC.
pub const MAX_BID_DECREASE_RATIO: f64 = 0.7;

const BID_COMPARISON_EPSILON: f64 = 1e-9;

/// Result of classifying one creative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Proposed mutation.
    pub kind: ActionKind,
    /// Decision tag.
    pub reason: ActionReason,
}

impl Classification {
    const fn new(kind: ActionKind, reason: ActionReason) -> Self {
        Self { kind, reason }
    }
}

/// Classifies a creative window. First matching rule wins:
/// sample gate, CPC ceiling, CTR floor, CTR scale threshold.
#[must_use]
pub fn classify_creative(window: &PerformanceWindow, policy: &PolicyConfig) -> Classification {
    if window.clicks() < policy.min_sample_size() {
        return Classification::new(ActionKind::Noop, ActionReason::InsufficientSample);
    }

    if window.cpc().is_some_and(|cpc| cpc > policy.max_cpc()) {
        return Classification::new(ActionKind::Pause, ActionReason::CpcExceeded);
    }

    let ctr = window.ctr_percent();
    if ctr < policy.min_ctr() {
        return Classification::new(ActionKind::Pause, ActionReason::LowCtr);
    }

    if ctr > policy.top_ctr() {
        return Classification::new(ActionKind::Scale, ActionReason::HighCtr);
    }

    Classification::new(ActionKind::Noop, ActionReason::WithinBounds)
}

/// Bid change proposed for a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BidProposal {
    /// Aggregate CPC over the lookback window.
    pub current_bid: f64,
    /// Bid to set.
    pub proposed_bid: f64,
    /// Origin of the proposed bid.
    pub source: BidSource,
}

/// Outcome of evaluating a campaign aggregate for a bid change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BidDecision {
    /// Too few clicks to trust the aggregate CPC.
    InsufficientSample,
    /// The best bid is within the change threshold of the current CPC.
    WithinBounds(BidProposal),
    /// The bid should change.
    Adjust(BidProposal),
}

/// Evaluates a campaign aggregate, preferring a scoring-service suggestion.
///
/// Suggestions that are not finite and positive are ignored.
#[must_use]
pub fn propose_bid(
    aggregate: &PerformanceWindow,
    suggestion: Option<f64>,
    policy: &PolicyConfig,
) -> BidDecision {
    let Some(current_bid) = aggregate.cpc() else {
        return BidDecision::InsufficientSample;
    };
    if aggregate.clicks() < policy.min_sample_size() {
        return BidDecision::InsufficientSample;
    }

    let proposal = match suggestion.filter(|value| value.is_finite() && *value > 0.0) {
        Some(suggested) => BidProposal {
            current_bid,
            proposed_bid: round_cents(suggested.clamp(policy.bid_floor(), policy.bid_ceiling())),
            source: BidSource::ScoringService,
        },
        None => BidProposal {
            current_bid,
            proposed_bid: heuristic_bid(current_bid, aggregate.ctr_percent(), policy),
            source: BidSource::Heuristic,
        },
    };

    let delta = (proposal.proposed_bid - proposal.current_bid).abs();
    if delta > policy.bid_change_threshold() + BID_COMPARISON_EPSILON {
        BidDecision::Adjust(proposal)
    } else {
        BidDecision::WithinBounds(proposal)
    }
}

/// Steps the bid toward the target CPC.
///
/// Without an explicit target the CTR-implied target is used: a campaign
/// under the target CTR bids up for better placements, one above it bids
/// down. The step is capped per run and clamped to the policy bid range.
#[must_use]
pub fn heuristic_bid(current_cpc: f64, ctr_percent: f64, policy: &PolicyConfig) -> f64 {
    let target = match policy.target_cpc() {
        Some(target_cpc) => target_cpc,
        None if ctr_percent <= 0.0 => current_cpc,
        None => current_cpc * policy.target_ctr() / ctr_percent,
    };

    let stepped = target.clamp(
        current_cpc * MAX_BID_DECREASE_RATIO,
        current_cpc * MAX_BID_INCREASE_RATIO,
    );

    round_cents(stepped.clamp(policy.bid_floor(), policy.bid_ceiling()))
}

/// Rounds a money amount to two decimals.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
