//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod aes_secret_encryptor;
mod console_notifier;
mod http_ads_platform;
mod http_copy_generator;
mod http_credential_verifier;
mod http_oauth_client;
mod http_scoring_service;
mod http_support;
mod http_webhook_notifier;
mod in_memory_audit_log;
mod in_memory_metrics_store;
mod in_memory_secret_store;
mod postgres_audit_log;
mod postgres_metrics_store;
mod postgres_secret_store;
#[cfg(test)]
mod stub_http_server;

pub use aes_secret_encryptor::AesSecretEncryptor;
pub use console_notifier::ConsoleNotifier;
pub use http_ads_platform::{AdsApiConfig, HttpAdsPlatform};
pub use http_copy_generator::HttpCopyGenerator;
pub use http_credential_verifier::HttpCredentialVerifier;
pub use http_oauth_client::HttpOAuthClient;
pub use http_scoring_service::HttpScoringService;
pub use http_webhook_notifier::HttpWebhookNotifier;
pub use in_memory_audit_log::InMemoryAuditLog;
pub use in_memory_metrics_store::InMemoryMetricsStore;
pub use in_memory_secret_store::InMemorySecretStore;
pub use postgres_audit_log::PostgresAuditLog;
pub use postgres_metrics_store::PostgresMetricsStore;
pub use postgres_secret_store::PostgresSecretStore;
