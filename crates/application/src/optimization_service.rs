use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use adtune_core::{AppError, AppResult, RunId};
use adtune_domain::PolicyConfig;
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::action_executor::{ActionExecutor, ExecutionContext};
use crate::decision_engine::{DecisionEngine, MetricsSnapshot, Suggestions};
use crate::optimization_ports::{
    ContentSuggestion, CopyGenerator, MetricsQuery, MetricsStore, Notification,
    NotificationSeverity, Notifier, ScoringService,
};

mod report;


pub use report::{ActionError, KindCounts, PerformanceSummary, RunReport};
use report::RunReportParts;

/// Runs one optimization pass: read metrics, decide, execute, audit, notify.
#[derive(Clone)]
pub struct OptimizationService {
    metrics_store: Arc<dyn MetricsStore>,
    executor: ActionExecutor,
    scoring_service: Option<Arc<dyn ScoringService>>,
    scoring_timeout: Duration,
    copy_generator: Option<Arc<dyn CopyGenerator>>,
    copy_timeout: Duration,
    notifier: Option<Arc<dyn Notifier>>,
}

impl OptimizationService {
    /// Creates an optimization service.
    #[must_use]
    pub fn new(metrics_store: Arc<dyn MetricsStore>, executor: ActionExecutor) -> Self {
        Self {
            metrics_store,
            executor,
            scoring_service: None,
            scoring_timeout: Duration::from_secs(5),
            copy_generator: None,
            copy_timeout: Duration::from_secs(30),
            notifier: None,
        }
    }

    /// Adds the optional bid scoring service with a per-call timeout.
    #[must_use]
    pub fn with_scoring_service(
        mut self,
        scoring_service: Arc<dyn ScoringService>,
        timeout: Duration,
    ) -> Self {
        self.scoring_service = Some(scoring_service);
        self.scoring_timeout = timeout;
        self
    }

    /// Adds the optional ad copy generator with a per-call timeout.
    #[must_use]
    pub fn with_copy_generator(
        mut self,
        copy_generator: Arc<dyn CopyGenerator>,
        timeout: Duration,
    ) -> Self {
        self.copy_generator = Some(copy_generator);
        self.copy_timeout = timeout;
        self
    }

    /// Adds the run summary notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Executes one run against metrics for the policy's lookback ending at `now`.
    ///
    /// Returns an error only when metrics cannot be read or the audit log
    /// cannot be written; every other failure is recorded in the report.
    pub async fn run(&self, policy: PolicyConfig, now: DateTime<Utc>) -> AppResult<RunReport> {
        let run_id = RunId::new();
        let dry_run = policy.dry_run();
        let since = now - chrono::Duration::days(i64::from(policy.lookback_days()));
        info!(%run_id, dry_run, %since, "optimization run started");

        let records = self
            .metrics_store
            .list_windows(MetricsQuery { since, until: now })
            .await?;

        let engine = DecisionEngine::new(policy);
        let snapshot = engine.prepare(records);
        for rejected in snapshot.rejected() {
            warn!(%run_id, subject_id = %rejected.subject_id, reason = %rejected.reason, "metrics rejected");
        }

        let suggestions = Suggestions {
            bids: self.collect_bid_suggestions(run_id, &engine, &snapshot).await,
            variations: self.collect_variations(run_id, &engine, &snapshot).await,
        };
        let (plan, mut rejected_windows) = engine.decide(&snapshot, &suggestions, now);
        for rejected in &rejected_windows {
            warn!(%run_id, subject_id = %rejected.subject_id, reason = %rejected.reason, "subject skipped");
        }
        let plan_fingerprint = plan.fingerprint().to_owned();
        info!(%run_id, actions = plan.actions().len(), %plan_fingerprint, "plan ready");

        let context = ExecutionContext {
            run_id,
            dry_run,
            idempotency_since: since,
        };
        let actions = match self.executor.execute(context, plan.into_actions()).await {
            Ok(actions) => actions,
            Err(execute_error) => {
                error!(%run_id, error = %execute_error, "run aborted");
                self.notify(Notification {
                    subject: format!("Optimization run {run_id} failed"),
                    message: execute_error.to_string(),
                    severity: NotificationSeverity::Critical,
                })
                .await;
                return Err(execute_error);
            }
        };

        let mut all_rejected = snapshot.rejected().to_vec();
        all_rejected.append(&mut rejected_windows);

        let report = RunReport::new(RunReportParts {
            run_id,
            dry_run,
            started_at: now,
            finished_at: Utc::now().max(now),
            plan_fingerprint,
            rejected_windows: all_rejected,
            performance: PerformanceSummary::from_windows(
                snapshot.creatives(),
                snapshot.campaigns().len(),
            ),
            actions,
        });

        if report.credential_invalid {
            error!(%run_id, "platform rejected the access token");
        }
        info!(
            %run_id,
            proposed = report.actions_proposed,
            executed = report.actions_executed,
            skipped = report.actions_skipped,
            failed = report.actions_failed,
            "optimization run finished"
        );

        let severity = if report.credential_invalid {
            NotificationSeverity::Critical
        } else if report.is_clean() {
            NotificationSeverity::Info
        } else {
            NotificationSeverity::Warning
        };
        self.notify(Notification {
            subject: format!(
                "Optimization run {run_id}: {} executed, {} failed",
                report.actions_executed, report.actions_failed
            ),
            message: report.render_text(),
            severity,
        })
        .await;

        Ok(report)
    }

    async fn collect_bid_suggestions(
        &self,
        run_id: RunId,
        engine: &DecisionEngine,
        snapshot: &MetricsSnapshot,
    ) -> BTreeMap<String, f64> {
        let mut suggestions = BTreeMap::new();
        let Some(scoring_service) = &self.scoring_service else {
            return suggestions;
        };

        for context in engine.campaign_contexts(snapshot) {
            let campaign_id = context.campaign_id.clone();
            let suggestion =
                tokio::time::timeout(self.scoring_timeout, scoring_service.suggest_bid(&context))
                    .await
                    .map_err(|_| AppError::Transient("scoring service timed out".to_owned()))
                    .and_then(|result| result);

            match suggestion {
                Ok(Some(bid)) => {
                    suggestions.insert(campaign_id, bid);
                }
                Ok(None) => {}
                Err(scoring_error) => warn!(
                    %run_id,
                    campaign_id = %campaign_id,
                    error = %scoring_error,
                    "scoring unavailable, using heuristic bid"
                ),
            }
        }

        suggestions
    }

    async fn collect_variations(
        &self,
        run_id: RunId,
        engine: &DecisionEngine,
        snapshot: &MetricsSnapshot,
    ) -> BTreeMap<String, ContentSuggestion> {
        let mut variations = BTreeMap::new();
        let Some(copy_generator) = &self.copy_generator else {
            return variations;
        };

        for context in engine.variation_contexts(snapshot) {
            let creative_id = context.creative_id.clone();
            let variation = tokio::time::timeout(
                self.copy_timeout,
                copy_generator.suggest_variation(&context),
            )
            .await
            .map_err(|_| AppError::Transient("copy generator timed out".to_owned()))
            .and_then(|result| result);

            match variation {
                Ok(Some(suggestion)) => {
                    variations.insert(creative_id, suggestion);
                }
                Ok(None) => {}
                Err(copy_error) => warn!(
                    %run_id,
                    creative_id = %creative_id,
                    error = %copy_error,
                    "copy generation unavailable, duplicating unchanged"
                ),
            }
        }

        variations
    }

    async fn notify(&self, notification: Notification) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        if let Err(notify_error) = notifier.publish(notification).await {
            warn!(error = %notify_error, "run notification failed");
        }
    }
}
