use std::sync::Arc;

use adtune_core::{AppError, AppResult};
use adtune_domain::{RotationStep, SecretVersion, StageLabel, StageUpdate};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::optimization_ports::{Notification, NotificationSeverity, Notifier};
use crate::rotation_ports::{CredentialVerifier, OAuthClient, SecretStore};


/// What a rotation step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStepStatus {
    /// The step changed the secret store.
    Applied,
    /// An earlier invocation already completed the step.
    AlreadyApplied,
    /// The step has nothing to do.
    NoOp,
}

/// Scheduler request for one rotation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRequest {
    /// Secret holding the platform credential.
    pub secret_id: String,
    /// Version the rotation creates and promotes (the rotation token).
    pub version_id: String,
    /// Step to run.
    pub step: RotationStep,
}

/// Result of one rotation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RotationStepResult {
    /// Step that ran.
    pub step: RotationStep,
    /// Secret identifier.
    pub secret_id: String,
    /// Rotated version identifier.
    pub version_id: String,
    /// What the step did.
    pub status: RotationStepStatus,
}

/// Four-step credential rotation against the versioned secret store.
///
/// Every step re-derives its position from stage labels and the
/// verification marker, so steps may be retried or arrive out of order.
/// `AWSCURRENT` only moves in `finishSecret`, through a compare-and-swap.
#[derive(Clone)]
pub struct RotationService {
    secret_store: Arc<dyn SecretStore>,
    oauth_client: Arc<dyn OAuthClient>,
    verifier: Arc<dyn CredentialVerifier>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl RotationService {
    /// Creates a rotation service.
    #[must_use]
    pub fn new(
        secret_store: Arc<dyn SecretStore>,
        oauth_client: Arc<dyn OAuthClient>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Self {
        Self {
            secret_store,
            oauth_client,
            verifier,
            notifier: None,
        }
    }

    /// Adds rotation notifications.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Runs one step. Retryable failures satisfy `AppError::is_retryable`.
    pub async fn handle(
        &self,
        request: &RotationRequest,
        now: DateTime<Utc>,
    ) -> AppResult<RotationStepResult> {
        let secret_id = request.secret_id.as_str();
        let version_id = request.version_id.as_str();
        info!(secret_id, version_id, step = request.step.as_str(), "rotation step started");

        let outcome = match request.step {
            RotationStep::CreateSecret => self.create_secret(secret_id, version_id, now).await,
            RotationStep::SetSecret => Ok(RotationStepStatus::NoOp),
            RotationStep::TestSecret => self.test_secret(secret_id, version_id, now).await,
            RotationStep::FinishSecret => self.finish_secret(secret_id, version_id).await,
        };

        match outcome {
            Ok(status) => {
                info!(secret_id, version_id, step = request.step.as_str(), ?status, "rotation step finished");
                if request.step == RotationStep::FinishSecret && status == RotationStepStatus::Applied {
                    self.notify(Notification {
                        subject: format!("Credential {secret_id} rotated"),
                        message: format!("version {version_id} is now AWSCURRENT"),
                        severity: NotificationSeverity::Info,
                    })
                    .await;
                }

                Ok(RotationStepResult {
                    step: request.step,
                    secret_id: secret_id.to_owned(),
                    version_id: version_id.to_owned(),
                    status,
                })
            }
            Err(step_error) => {
                let retryable = step_error.is_retryable();
                warn!(
                    secret_id,
                    version_id,
                    step = request.step.as_str(),
                    retryable,
                    error = %step_error,
                    "rotation step failed"
                );
                self.notify(Notification {
                    subject: format!(
                        "Credential rotation {} failed for {secret_id}",
                        request.step.as_str()
                    ),
                    message: format!(
                        "version {version_id}: {step_error} ({})",
                        if retryable { "will be retried" } else { "operator action required" }
                    ),
                    severity: if retryable {
                        NotificationSeverity::Warning
                    } else {
                        NotificationSeverity::Critical
                    },
                })
                .await;
                Err(step_error)
            }
        }
    }

    async fn create_secret(
        &self,
        secret_id: &str,
        version_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RotationStepStatus> {
        if self
            .secret_store
            .get_secret_version(secret_id, version_id)
            .await?
            .is_some()
        {
            return Ok(RotationStepStatus::AlreadyApplied);
        }

        let current = self
            .secret_store
            .get_secret(secret_id, StageLabel::Current)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("secret '{secret_id}' has no AWSCURRENT version"))
            })?;

        let grant = self.oauth_client.refresh(current.credentials().refresh_grant()?).await?;
        let credentials = current.credentials().with_refreshed_tokens(
            grant.access_token,
            grant.refresh_token,
            now.to_rfc3339(),
        );

        let stored = self
            .secret_store
            .put_secret_version(secret_id, version_id, StageLabel::Pending, credentials)
            .await;
        match stored {
            Ok(_) => Ok(RotationStepStatus::Applied),
            // A concurrent invocation stored the same version first.
            Err(AppError::Conflict(message)) => {
                let existing = self
                    .secret_store
                    .get_secret_version(secret_id, version_id)
                    .await?;
                match existing {
                    Some(_) => Ok(RotationStepStatus::AlreadyApplied),
                    None => Err(AppError::Conflict(message)),
                }
            }
            Err(error) => Err(error),
        }
    }

    async fn test_secret(
        &self,
        secret_id: &str,
        version_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<RotationStepStatus> {
        let version = self.require_version(secret_id, version_id).await?;
        if version.has_stage(StageLabel::Current) {
            return Ok(RotationStepStatus::AlreadyApplied);
        }
        if !version.has_stage(StageLabel::Pending) {
            return Err(AppError::Conflict(format!(
                "version '{version_id}' of '{secret_id}' is not AWSPENDING"
            )));
        }

        self.verifier
            .verify(version.credentials())
            .await
            .map_err(|error| {
                AppError::Transient(format!("pending credential failed verification: {error}"))
            })?;

        self.secret_store
            .mark_verified(secret_id, version_id, now)
            .await?;
        Ok(RotationStepStatus::Applied)
    }

    async fn finish_secret(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> AppResult<RotationStepStatus> {
        let version = self.require_version(secret_id, version_id).await?;
        if version.has_stage(StageLabel::Current) {
            return Ok(RotationStepStatus::AlreadyApplied);
        }
        if !version.has_stage(StageLabel::Pending) {
            return Err(AppError::Conflict(format!(
                "version '{version_id}' of '{secret_id}' is not AWSPENDING"
            )));
        }
        if version.verified_at().is_none() {
            return Err(AppError::Conflict(format!(
                "version '{version_id}' of '{secret_id}' has not passed testSecret"
            )));
        }

        let current_version_id = self
            .secret_store
            .get_secret(secret_id, StageLabel::Current)
            .await?
            .map(|current| current.version_id().as_str().to_owned());

        self.secret_store
            .update_stage(
                secret_id,
                StageUpdate {
                    stage: StageLabel::Current,
                    move_to_version_id: version_id.to_owned(),
                    remove_from_version_id: current_version_id,
                },
            )
            .await?;
        Ok(RotationStepStatus::Applied)
    }

    async fn require_version(
        &self,
        secret_id: &str,
        version_id: &str,
    ) -> AppResult<SecretVersion> {
        self.secret_store
            .get_secret_version(secret_id, version_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "version '{version_id}' of secret '{secret_id}' does not exist"
                ))
            })
    }

    async fn notify(&self, notification: Notification) {
        let Some(notifier) = &self.notifier else {
            return;
        };

        if let Err(notify_error) = notifier.publish(notification).await {
            warn!(error = %notify_error, "rotation notification failed");
        }
    }
}
