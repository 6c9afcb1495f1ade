//! Application services and ports.

#![forbid(unsafe_code)]

mod action_executor;
mod decision_engine;
mod digest;
mod optimization_ports;
mod optimization_service;
mod rotation_ports;
mod rotation_service;

pub use action_executor::{ActionExecutor, ExecutionContext, ExecutorConfig, RetryPolicy};
pub use decision_engine::{
    DecisionEngine, DecisionPlan, MetricsSnapshot, RejectedWindow, Suggestions,
};
pub use optimization_ports::{
    AdsPlatform, AuditLog, AuditRecord, CampaignContext, ContentSuggestion, CopyGenerator,
    MetricsQuery, MetricsStore, Notification, NotificationSeverity, Notifier, ScoringService,
    VariationContext,
};
pub use optimization_service::{
    ActionError, KindCounts, OptimizationService, PerformanceSummary, RunReport,
};
pub use rotation_ports::{
    CredentialVerifier, OAuthClient, SecretEncryptor, SecretStore, TokenGrant,
};
pub use rotation_service::{
    RotationRequest, RotationService, RotationStepResult, RotationStepStatus,
};

