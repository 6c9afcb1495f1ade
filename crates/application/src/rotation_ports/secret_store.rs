use async_trait::async_trait;
use adtune_core::{ApiCredentials, AppResult};
use adtune_domain::{SecretVersion, StageLabel, StageUpdate};
use chrono::{DateTime, Utc};

/// Port for the versioned secret store holding the platform credential.
///
/// Stage moves are compare-and-swap: an update naming a
/// `remove_from_version_id` that no longer holds the stage fails with
/// `AppError::Conflict` and leaves every label untouched.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Returns the version currently holding a stage label.
    async fn get_secret(&self, secret_id: &str, stage: StageLabel)
    -> AppResult<Option<SecretVersion>>;

    /// Returns a version by identifier.
    async fn get_secret_version(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> AppResult<Option<SecretVersion>>;

    /// Stores a new version carrying one stage label.
    ///
    /// A stage label is held by one version at a time: the label moves off
    /// whichever version held it. Storing an existing version id fails with
    /// `AppError::Conflict`. `AWSCURRENT` is only accepted for the first
    /// version of a secret.
    async fn put_secret_version(
        &self,
        secret_id: &str,
        version_id: &str,
        stage: StageLabel,
        credentials: ApiCredentials,
    ) -> AppResult<SecretVersion>;

    /// Records that a version passed the authenticated read.
    async fn mark_verified(
        &self,
        secret_id: &str,
        version_id: &str,
        verified_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Moves a stage label atomically.
    async fn update_stage(&self, secret_id: &str, update: StageUpdate) -> AppResult<()>;
}
