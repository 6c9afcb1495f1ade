//! Console notifier for local runs. Logs notifications to tracing output.

use async_trait::async_trait;
use adtune_application::{Notification, NotificationSeverity, Notifier};
use adtune_core::AppResult;
use tracing::{error, info, warn};

/// Notifier that writes notifications to the log.
#[derive(Clone)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Creates a new console notifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn publish(&self, notification: Notification) -> AppResult<()> {
        let Notification {
            subject,
            message,
            severity,
        } = notification;

        match severity {
            NotificationSeverity::Info => info!(
                subject = %subject,
                "--- NOTIFICATION ---\n{}\n\n{}\n--- END NOTIFICATION ---",
                subject,
                message
            ),
            NotificationSeverity::Warning => warn!(
                subject = %subject,
                "--- NOTIFICATION ---\n{}\n\n{}\n--- END NOTIFICATION ---",
                subject,
                message
            ),
            NotificationSeverity::Critical => error!(
                subject = %subject,
                "--- NOTIFICATION ---\n{}\n\n{}\n--- END NOTIFICATION ---",
                subject,
                message
            ),
        }

        Ok(())
    }
}
