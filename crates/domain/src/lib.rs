//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod action;
mod creative;
mod decision;
mod performance;
mod policy;
mod rotation;

pub use action::{
    Action, ActionDetail, ActionFailure, ActionInput, ActionKind, ActionOutcome, ActionReason,
    BidSource, OutcomeReason,
};
pub use creative::{ContentPatch, Creative, CreativeContent, CreativeStatus};
pub use decision::{
    BidDecision, BidProposal, Classification, MAX_BID_DECREASE_RATIO, MAX_BID_INCREASE_RATIO,
    classify_creative, heuristic_bid, propose_bid, round_cents,
};
pub use performance::{PerformanceRecord, PerformanceWindow, SubjectKind};
pub use policy::{PolicyConfig, PolicyConfigInput};
pub use rotation::{
    RotationStep, SecretVersion, StageLabel, StageUpdate, apply_stage_update, promote_to_current,
};
