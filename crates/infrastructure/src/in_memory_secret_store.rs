use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use adtune_application::SecretStore;
use adtune_core::{ApiCredentials, AppError, AppResult};
use adtune_domain::{SecretVersion, StageLabel, StageUpdate, apply_stage_update};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// In-memory versioned secret store.
///
/// Stage moves run under one write lock, which makes them atomic.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, Vec<SecretVersion>>>,
}

impl InMemorySecretStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every version of a secret.
    pub async fn versions(&self, secret_id: &str) -> Vec<SecretVersion> {
        self.secrets
            .read()
            .await
            .get(secret_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret(
        &self,
        secret_id: &str,
        stage: StageLabel,
    ) -> AppResult<Option<SecretVersion>> {
        let secrets = self.secrets.read().await;
        Ok(secrets.get(secret_id).and_then(|versions| {
            versions
                .iter()
                .find(|version| version.has_stage(stage))
                .cloned()
        }))
    }

    async fn get_secret_version(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> AppResult<Option<SecretVersion>> {
        let secrets = self.secrets.read().await;
        Ok(secrets.get(secret_id).and_then(|versions| {
            versions
                .iter()
                .find(|version| version.version_id().as_str() == version_id)
                .cloned()
        }))
    }

    async fn put_secret_version(
        &self,
        secret_id: &str,
        version_id: &str,
        stage: StageLabel,
        credentials: ApiCredentials,
    ) -> AppResult<SecretVersion> {
        let mut secrets = self.secrets.write().await;
        let versions = secrets.entry(secret_id.to_owned()).or_default();

        if versions
            .iter()
            .any(|version| version.version_id().as_str() == version_id)
        {
            return Err(AppError::Conflict(format!(
                "version '{version_id}' of secret '{secret_id}' already exists"
            )));
        }
        if stage == StageLabel::Current && !versions.is_empty() {
            return Err(AppError::Conflict(format!(
                "secret '{secret_id}' already has versions, AWSCURRENT moves only by promotion"
            )));
        }

        let stored = SecretVersion::new(
            version_id,
            BTreeSet::from([stage]),
            credentials,
            Utc::now(),
            None,
        )?;

        for version in versions.iter_mut() {
            if version.has_stage(stage) {
                let mut stages = version.stages().clone();
                stages.remove(&stage);
                *version = version.clone().with_stages(stages);
            }
        }
        versions.push(stored.clone());
        Ok(stored)
    }

    async fn mark_verified(
        &self,
        secret_id: &str,
        version_id: &str,
        verified_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut secrets = self.secrets.write().await;
        let version = secrets
            .get_mut(secret_id)
            .and_then(|versions| {
                versions
                    .iter_mut()
                    .find(|version| version.version_id().as_str() == version_id)
            })
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "version '{version_id}' of secret '{secret_id}' does not exist"
                ))
            })?;

        if !version.has_stage(StageLabel::Pending) {
            return Err(AppError::Conflict(format!(
                "version '{version_id}' of secret '{secret_id}' no longer holds AWSPENDING"
            )));
        }

        *version = version.clone().with_verified_at(verified_at);
        Ok(())
    }

    async fn update_stage(&self, secret_id: &str, update: StageUpdate) -> AppResult<()> {
        let mut secrets = self.secrets.write().await;
        let versions = secrets
            .get_mut(secret_id)
            .ok_or_else(|| AppError::NotFound(format!("secret '{secret_id}' does not exist")))?;

        let mut staged = versions.clone();
        apply_stage_update(&mut staged, &update)?;
        *versions = staged;
        Ok(())
    }
}
