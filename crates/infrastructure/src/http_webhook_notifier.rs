use async_trait::async_trait;
use adtune_application::{Notification, NotificationSeverity, Notifier};
use adtune_core::AppResult;
use serde_json::json;

use crate::http_support;

/// Posts notifications to a chat-style incoming webhook.
///
/// The payload carries `text` for Slack-compatible receivers alongside the
/// structured `subject`, `message` and `severity` fields.
#[derive(Clone)]
pub struct HttpWebhookNotifier {
    http_client: reqwest::Client,
    webhook_url: String,
}

impl HttpWebhookNotifier {
    /// Creates a webhook notifier.
    #[must_use]
    pub fn new(http_client: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            http_client,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpWebhookNotifier {
    async fn publish(&self, notification: Notification) -> AppResult<()> {
        let marker = match notification.severity {
            NotificationSeverity::Info => "[info]",
            NotificationSeverity::Warning => "[warning]",
            NotificationSeverity::Critical => "[CRITICAL]",
        };
        let payload = json!({
            "text": format!("{marker} {}\n{}", notification.subject, notification.message),
            "subject": notification.subject,
            "message": notification.message,
            "severity": notification.severity.as_str(),
        });

        http_support::send(
            self.http_client.post(self.webhook_url.as_str()).json(&payload),
            "notification webhook",
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use adtune_application::{Notification, NotificationSeverity, Notifier};

    use crate::stub_http_server::{self, StubResponse};

    use super::HttpWebhookNotifier;

    #[tokio::test]
    async fn posts_subject_message_and_severity() {
        let server = stub_http_server::spawn(vec![StubResponse::json(200, "ok")]).await;
        let notifier = HttpWebhookNotifier::new(reqwest::Client::new(), server.base_url.clone());

        let published = notifier
            .publish(Notification {
                subject: "Credential ads/linkedin rotated".to_owned(),
                message: "version v2 is now AWSCURRENT".to_owned(),
                severity: NotificationSeverity::Info,
            })
            .await;
        assert!(published.is_ok());

        let requests = server.requests.lock().await;
        assert!(requests[0].body.contains(r#""severity":"info""#));
        assert!(requests[0].body.contains("[info] Credential ads/linkedin rotated"));
    }
}
