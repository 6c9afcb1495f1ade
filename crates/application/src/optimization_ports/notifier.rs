use async_trait::async_trait;
use adtune_core::AppResult;

/// Urgency of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationSeverity {
    /// Routine report.
    Info,
    /// Something needs a look, nothing is broken yet.
    Warning,
    /// Operator action required.
    Critical,
}

impl NotificationSeverity {
    /// Returns stable value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Rendered message delivered to operators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short subject line.
    pub subject: String,
    /// Plain-text body.
    pub message: String,
    /// Urgency.
    pub severity: NotificationSeverity,
}

/// Port for operator notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers one notification.
    async fn publish(&self, notification: Notification) -> AppResult<()>;
}
