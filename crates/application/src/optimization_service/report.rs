use std::collections::BTreeMap;
use std::fmt::Write as _;

use adtune_core::{ErrorKind, RunId};
use adtune_domain::{Action, ActionKind, ActionOutcome, PerformanceWindow};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::decision_engine::RejectedWindow;

/// Per-kind action counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    /// Actions proposed.
    pub proposed: usize,
    /// Actions applied on the platform.
    pub executed: usize,
    /// Actions deliberately not applied.
    pub skipped: usize,
    /// Actions that failed.
    pub failed: usize,
}

/// Failure of one action, as surfaced in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionError {
    /// Failed action.
    pub action_id: String,
    /// Taxonomy bucket.
    pub kind: ErrorKind,
    /// Failure detail.
    pub message: String,
}

/// Account-level totals over the creatives analyzed in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceSummary {
    /// Creatives with valid metrics.
    pub creatives_analyzed: usize,
    /// Campaigns with valid metrics.
    pub campaigns_analyzed: usize,
    /// Total impressions.
    pub impressions: u64,
    /// Total clicks.
    pub clicks: u64,
    /// Total spend.
    pub cost: f64,
    /// Total conversions.
    pub conversions: u64,
    /// Aggregate click-through rate in percent.
    pub ctr_percent: f64,
    /// Aggregate cost per click.
    pub cpc: Option<f64>,
    /// Aggregate cost per acquisition.
    pub cpa: Option<f64>,
}

impl PerformanceSummary {
    /// Sums creative windows.
    #[must_use]
    pub fn from_windows(creatives: &[PerformanceWindow], campaigns_analyzed: usize) -> Self {
        let mut summary = Self {
            creatives_analyzed: creatives.len(),
            campaigns_analyzed,
            ..Self::default()
        };
        for window in creatives {
            summary.impressions = summary.impressions.saturating_add(window.impressions());
            summary.clicks = summary.clicks.saturating_add(window.clicks());
            summary.conversions = summary.conversions.saturating_add(window.conversions());
            summary.cost += window.cost();
        }

        if summary.impressions > 0 {
            summary.ctr_percent = summary.clicks as f64 / summary.impressions as f64 * 100.0;
        }
        summary.cpc = (summary.clicks > 0).then(|| summary.cost / summary.clicks as f64);
        summary.cpa = (summary.conversions > 0).then(|| summary.cost / summary.conversions as f64);
        summary
    }
}

/// Outcome of one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: RunId,
    /// Whether mutating calls were suppressed.
    pub dry_run: bool,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
    /// Digest of the proposed plan.
    pub plan_fingerprint: String,
    /// Actions proposed, one per analyzed subject.
    pub actions_proposed: usize,
    /// Actions applied on the platform.
    pub actions_executed: usize,
    /// Actions skipped (no-op, already applied, dry run).
    pub actions_skipped: usize,
    /// Actions that failed.
    pub actions_failed: usize,
    /// Counts split by action kind.
    pub counts_by_kind: BTreeMap<ActionKind, KindCounts>,
    /// Failures, in action order.
    pub errors: Vec<ActionError>,
    /// Metrics rows and subjects excluded from decisions.
    pub rejected_windows: Vec<RejectedWindow>,
    /// The platform rejected the access token during the run.
    pub credential_invalid: bool,
    /// Account-level totals.
    pub performance: PerformanceSummary,
    /// Every action with its outcome.
    pub actions: Vec<Action>,
}

/// Inputs assembled by the service once execution finished.
pub(super) struct RunReportParts {
    pub run_id: RunId,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub plan_fingerprint: String,
    pub rejected_windows: Vec<RejectedWindow>,
    pub performance: PerformanceSummary,
    pub actions: Vec<Action>,
}

impl RunReport {
    pub(super) fn new(parts: RunReportParts) -> Self {
        let RunReportParts {
            run_id,
            dry_run,
            started_at,
            finished_at,
            plan_fingerprint,
            rejected_windows,
            performance,
            actions,
        } = parts;

        let mut counts_by_kind: BTreeMap<ActionKind, KindCounts> = BTreeMap::new();
        let mut errors = Vec::new();
        for action in &actions {
            let counts = counts_by_kind.entry(action.kind()).or_default();
            counts.proposed += 1;
            match action.outcome() {
                ActionOutcome::Success => counts.executed += 1,
                ActionOutcome::Skipped => counts.skipped += 1,
                ActionOutcome::Failure | ActionOutcome::Pending => counts.failed += 1,
            }

            if let Some(failure) = action.failure() {
                errors.push(ActionError {
                    action_id: action.action_id().to_owned(),
                    kind: failure.kind,
                    message: failure.message.clone(),
                });
            }
        }

        let total = |field: fn(&KindCounts) -> usize| -> usize {
            counts_by_kind.values().map(field).sum()
        };
        let actions_executed = total(|counts| counts.executed);
        let actions_skipped = total(|counts| counts.skipped);
        let actions_failed = total(|counts| counts.failed);
        let credential_invalid = errors.iter().any(|error| error.kind == ErrorKind::Auth);

        Self {
            run_id,
            dry_run,
            started_at,
            finished_at,
            plan_fingerprint,
            actions_proposed: actions.len(),
            actions_executed,
            actions_skipped,
            actions_failed,
            counts_by_kind,
            errors,
            rejected_windows,
            credential_invalid,
            performance,
            actions,
        }
    }

    /// Returns true when every action succeeded or was skipped and no row was rejected.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.actions_failed == 0 && self.rejected_windows.is_empty()
    }

    /// Renders the plain-text summary sent to operators.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut text = String::new();
        let mode = if self.dry_run { " (dry run)" } else { "" };
        let _ = writeln!(text, "Optimization run {}{mode}", self.run_id);
        let _ = writeln!(
            text,
            "proposed {} | executed {} | skipped {} | failed {}",
            self.actions_proposed, self.actions_executed, self.actions_skipped, self.actions_failed
        );

        for (kind, counts) in &self.counts_by_kind {
            let _ = writeln!(
                text,
                "  {:<10} proposed {}, executed {}, skipped {}, failed {}",
                kind.as_str(),
                counts.proposed,
                counts.executed,
                counts.skipped,
                counts.failed
            );
        }

        let performance = &self.performance;
        let _ = writeln!(
            text,
            "performance: {} creatives, {} impressions, {} clicks, CTR {:.2}%, spend {:.2}, CPC {}",
            performance.creatives_analyzed,
            performance.impressions,
            performance.clicks,
            performance.ctr_percent,
            performance.cost,
            performance
                .cpc
                .map_or_else(|| "n/a".to_owned(), |cpc| format!("{cpc:.2}"))
        );

        if self.credential_invalid {
            let _ = writeln!(
                text,
                "CREDENTIAL INVALID: the platform rejected the access token, check rotation"
            );
        }

        if !self.errors.is_empty() {
            let _ = writeln!(text, "errors:");
            for error in &self.errors {
                let _ = writeln!(text, "  - {} [{}] {}", error.action_id, error.kind, error.message);
            }
        }

        if !self.rejected_windows.is_empty() {
            let _ = writeln!(text, "rejected metrics:");
            for rejected in &self.rejected_windows {
                let _ = writeln!(text, "  - {}: {}", rejected.subject_id, rejected.reason);
            }
        }

        text
    }
}
