mod ads_platform;
mod audit_log;
mod copy_generator;
mod metrics;
mod notifier;
mod scoring;

pub use ads_platform::AdsPlatform;
pub use audit_log::{AuditLog, AuditRecord};
pub use copy_generator::{ContentSuggestion, CopyGenerator, VariationContext};
pub use metrics::{MetricsQuery, MetricsStore};
pub use notifier::{Notification, NotificationSeverity, Notifier};
pub use scoring::{CampaignContext, ScoringService};
