use std::collections::BTreeSet;

use adtune_core::{ApiCredentials, AppError, AppResult, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stage label attached to a secret version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StageLabel {
    /// The version every platform call uses.
    #[serde(rename = "AWSCURRENT")]
    Current,
    /// The version being prepared by an in-flight rotation.
    #[serde(rename = "AWSPENDING")]
    Pending,
    /// The version superseded by the last completed rotation.
    #[serde(rename = "AWSPREVIOUS")]
    Previous,
}

impl StageLabel {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Current => "AWSCURRENT",
            Self::Pending => "AWSPENDING",
            Self::Previous => "AWSPREVIOUS",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "AWSCURRENT" => Ok(Self::Current),
            "AWSPENDING" => Ok(Self::Pending),
            "AWSPREVIOUS" => Ok(Self::Previous),
            _ => Err(AppError::Validation(format!(
                "unknown secret stage label '{value}'"
            ))),
        }
    }
}

/// One step of the four-step rotation protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationStep {
    /// Refresh the credential and store it as pending.
    #[serde(rename = "createSecret")]
    CreateSecret,
    /// Push the pending credential to the resource. Nothing to do for OAuth tokens.
    #[serde(rename = "setSecret")]
    SetSecret,
    /// Verify the pending credential against the platform.
    #[serde(rename = "testSecret")]
    TestSecret,
    /// Promote the pending credential to current.
    #[serde(rename = "finishSecret")]
    FinishSecret,
}

impl RotationStep {
    /// Returns the scheduler's step name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSecret => "createSecret",
            Self::SetSecret => "setSecret",
            Self::TestSecret => "testSecret",
            Self::FinishSecret => "finishSecret",
        }
    }

    /// Parses the scheduler's step name.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "createSecret" => Ok(Self::CreateSecret),
            "setSecret" => Ok(Self::SetSecret),
            "testSecret" => Ok(Self::TestSecret),
            "finishSecret" => Ok(Self::FinishSecret),
            _ => Err(AppError::Validation(format!(
                "unknown rotation step '{value}'"
            ))),
        }
    }
}

/// One stored version of the platform credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretVersion {
    version_id: NonEmptyString,
    stages: BTreeSet<StageLabel>,
    credentials: ApiCredentials,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

impl SecretVersion {
    /// Creates a validated secret version.
    pub fn new(
        version_id: impl Into<String>,
        stages: BTreeSet<StageLabel>,
        credentials: ApiCredentials,
        created_at: DateTime<Utc>,
        verified_at: Option<DateTime<Utc>>,
    ) -> AppResult<Self> {
        if credentials.access_token().trim().is_empty() {
            return Err(AppError::Validation(
                "secret version requires a non-empty access_token".to_owned(),
            ));
        }

        Ok(Self {
            version_id: NonEmptyString::new(version_id)?,
            stages,
            credentials,
            created_at,
            verified_at,
        })
    }

    /// Returns the version identifier (the scheduler's rotation token).
    #[must_use]
    pub fn version_id(&self) -> &NonEmptyString {
        &self.version_id
    }

    /// Returns the stage labels held by this version.
    #[must_use]
    pub fn stages(&self) -> &BTreeSet<StageLabel> {
        &self.stages
    }

    /// Returns true when this version holds the label.
    #[must_use]
    pub fn has_stage(&self, stage: StageLabel) -> bool {
        self.stages.contains(&stage)
    }

    /// Returns the stored credentials.
    #[must_use]
    pub fn credentials(&self) -> &ApiCredentials {
        &self.credentials
    }

    /// Returns when the version was stored.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the version passed verification against the platform.
    #[must_use]
    pub fn verified_at(&self) -> Option<DateTime<Utc>> {
        self.verified_at
    }

    /// Returns a copy carrying different stage labels.
    #[must_use]
    pub fn with_stages(mut self, stages: BTreeSet<StageLabel>) -> Self {
        self.stages = stages;
        self
    }

    /// Returns a copy marked as verified.
    #[must_use]
    pub fn with_verified_at(mut self, verified_at: DateTime<Utc>) -> Self {
        self.verified_at = Some(verified_at);
        self
    }
}

/// Moves `AWSCURRENT` onto `promoted_version_id` inside a full version set.
///
/// Only a verified version still holding `AWSPENDING` can be promoted.
/// The promoted version loses `AWSPENDING`, the previous holder of
/// `AWSCURRENT` becomes `AWSPREVIOUS`, and the old `AWSPREVIOUS` label is
/// dropped. Fails with a conflict when `expected_current_version_id` no
/// longer holds `AWSCURRENT`, so two racing rotations cannot both promote.
/// Store adapters call this inside their atomic section.
pub fn promote_to_current(
    versions: &mut [SecretVersion],
    promoted_version_id: &str,
    expected_current_version_id: Option<&str>,
) -> AppResult<()> {
    let current_holder = versions
        .iter()
        .find(|version| version.has_stage(StageLabel::Current))
        .map(|version| version.version_id.as_str().to_owned());

    if current_holder.as_deref() != expected_current_version_id {
        return Err(AppError::Conflict(format!(
            "AWSCURRENT is held by {} but {} was expected",
            current_holder.as_deref().unwrap_or("no version"),
            expected_current_version_id.unwrap_or("no version")
        )));
    }

    let Some(promoted) = versions
        .iter()
        .find(|version| version.version_id.as_str() == promoted_version_id)
    else {
        return Err(AppError::NotFound(format!(
            "secret version '{promoted_version_id}' does not exist"
        )));
    };

    if !promoted.has_stage(StageLabel::Pending) {
        return Err(AppError::Conflict(format!(
            "secret version '{promoted_version_id}' no longer holds AWSPENDING"
        )));
    }

    if promoted.verified_at.is_none() {
        return Err(AppError::Conflict(format!(
            "secret version '{promoted_version_id}' has not passed verification"
        )));
    }

    for version in versions.iter_mut() {
        let is_promoted = version.version_id.as_str() == promoted_version_id;
        let was_current = version.stages.remove(&StageLabel::Current);
        version.stages.remove(&StageLabel::Previous);

        if is_promoted {
            version.stages.remove(&StageLabel::Pending);
            version.stages.insert(StageLabel::Current);
        } else if was_current {
            version.stages.insert(StageLabel::Previous);
        }
    }

    Ok(())
}

/// Request to move one stage label onto a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageUpdate {
    /// Label to move.
    pub stage: StageLabel,
    /// Version that receives the label.
    pub move_to_version_id: String,
    /// Version expected to hold the label now; `None` when no version should.
    pub remove_from_version_id: Option<String>,
}

/// Applies a compare-and-swap stage move to a full version set.
///
/// `AWSCURRENT` moves go through [`promote_to_current`]. Other labels move
/// verbatim. `AWSPREVIOUS` is maintained by promotion and cannot be moved
/// directly.
pub fn apply_stage_update(versions: &mut [SecretVersion], update: &StageUpdate) -> AppResult<()> {
    match update.stage {
        StageLabel::Current => promote_to_current(
            versions,
            update.move_to_version_id.as_str(),
            update.remove_from_version_id.as_deref(),
        ),
        StageLabel::Previous => Err(AppError::Validation(
            "AWSPREVIOUS is assigned by promotion and cannot be moved directly".to_owned(),
        )),
        StageLabel::Pending => {
            let holder = versions
                .iter()
                .find(|version| version.has_stage(StageLabel::Pending))
                .map(|version| version.version_id.as_str().to_owned());
            if holder.as_deref() != update.remove_from_version_id.as_deref() {
                return Err(AppError::Conflict(format!(
                    "AWSPENDING is held by {} but {} was expected",
                    holder.as_deref().unwrap_or("no version"),
                    update.remove_from_version_id.as_deref().unwrap_or("no version")
                )));
            }

            if !versions
                .iter()
                .any(|version| version.version_id.as_str() == update.move_to_version_id)
            {
                return Err(AppError::NotFound(format!(
                    "secret version '{}' does not exist",
                    update.move_to_version_id
                )));
            }

            for version in versions.iter_mut() {
                version.stages.remove(&StageLabel::Pending);
                if version.version_id.as_str() == update.move_to_version_id {
                    version.stages.insert(StageLabel::Pending);
                }
            }

            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use adtune_core::ApiCredentials;
    use chrono::Utc;

    use super::{
        RotationStep, SecretVersion, StageLabel, StageUpdate, apply_stage_update,
        promote_to_current,
    };

    fn version(id: &str, stages: &[StageLabel]) -> SecretVersion {
        SecretVersion::new(
            id,
            stages.iter().copied().collect::<BTreeSet<_>>(),
            ApiCredentials::new(format!("token-{id}"), None, None, None),
            Utc::now(),
            None,
        )
        .unwrap_or_else(|_| unreachable!())
    }

    fn holders(versions: &[SecretVersion], stage: StageLabel) -> Vec<String> {
        versions
            .iter()
            .filter(|version| version.has_stage(stage))
            .map(|version| version.version_id().as_str().to_owned())
            .collect()
    }

    #[test]
    fn promotion_relabels_current_previous_and_pending() {
        let mut versions = vec![
            version("v1", &[StageLabel::Previous]),
            version("v2", &[StageLabel::Current]),
            version("v3", &[StageLabel::Pending]).with_verified_at(Utc::now()),
        ];

        assert!(promote_to_current(&mut versions, "v3", Some("v2")).is_ok());

        assert_eq!(holders(&versions, StageLabel::Current), vec!["v3"]);
        assert_eq!(holders(&versions, StageLabel::Previous), vec!["v2"]);
        assert!(holders(&versions, StageLabel::Pending).is_empty());
        assert!(versions[0].stages().is_empty());
    }

    #[test]
    fn promotion_detects_stage_mismatch() {
        let mut versions = vec![
            version("v2", &[StageLabel::Previous]),
            version("v3", &[StageLabel::Current]),
            version("v4", &[StageLabel::Pending]),
        ];

        let result = promote_to_current(&mut versions, "v4", Some("v2"));
        assert!(matches!(result, Err(adtune_core::AppError::Conflict(_))));
        assert_eq!(holders(&versions, StageLabel::Current), vec!["v3"]);
    }

    #[test]
    fn promotion_rejects_a_version_that_lost_pending() {
        let mut versions = vec![
            version("v1", &[StageLabel::Current]),
            version("vA", &[]).with_verified_at(Utc::now()),
            version("vB", &[StageLabel::Pending]),
        ];
        let before = versions.clone();

        let result = promote_to_current(&mut versions, "vA", Some("v1"));
        assert!(matches!(result, Err(adtune_core::AppError::Conflict(_))));
        assert_eq!(versions, before);
    }

    #[test]
    fn promotion_rejects_an_unverified_pending_version() {
        let mut versions = vec![
            version("v1", &[StageLabel::Current]),
            version("v2", &[StageLabel::Pending]),
        ];

        let result = promote_to_current(&mut versions, "v2", Some("v1"));
        assert!(matches!(result, Err(adtune_core::AppError::Conflict(_))));
        assert_eq!(holders(&versions, StageLabel::Current), vec!["v1"]);
        assert_eq!(holders(&versions, StageLabel::Pending), vec!["v2"]);
    }

    #[test]
    fn previous_label_cannot_be_moved_directly() {
        let mut versions = vec![version("v1", &[StageLabel::Current]), version("v2", &[])];
        let result = apply_stage_update(
            &mut versions,
            &StageUpdate {
                stage: StageLabel::Previous,
                move_to_version_id: "v2".to_owned(),
                remove_from_version_id: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn pending_label_moves_with_compare_and_swap() {
        let mut versions = vec![
            version("v1", &[StageLabel::Current]),
            version("v2", &[StageLabel::Pending]),
            version("v3", &[]),
        ];

        let stale = apply_stage_update(
            &mut versions,
            &StageUpdate {
                stage: StageLabel::Pending,
                move_to_version_id: "v3".to_owned(),
                remove_from_version_id: None,
            },
        );
        assert!(stale.is_err());

        let moved = apply_stage_update(
            &mut versions,
            &StageUpdate {
                stage: StageLabel::Pending,
                move_to_version_id: "v3".to_owned(),
                remove_from_version_id: Some("v2".to_owned()),
            },
        );
        assert!(moved.is_ok());
        assert_eq!(holders(&versions, StageLabel::Pending), vec!["v3"]);
        assert_eq!(holders(&versions, StageLabel::Current), vec!["v1"]);
    }

    #[test]
    fn rotation_step_names_match_scheduler_contract() {
        assert!(matches!(
            RotationStep::parse("finishSecret"),
            Ok(RotationStep::FinishSecret)
        ));
        assert!(RotationStep::parse("finish").is_err());
        assert_eq!(StageLabel::Pending.as_str(), "AWSPENDING");
    }

    #[test]
    fn stage_labels_serialize_with_store_names() {
        let encoded = serde_json::to_string(&StageLabel::Current);
        assert!(matches!(encoded.as_deref(), Ok("\"AWSCURRENT\"")));
    }

    #[test]
    fn secret_version_requires_access_token() {
        let version = SecretVersion::new(
            "v1",
            BTreeSet::new(),
            ApiCredentials::new(" ", None, None, None),
            Utc::now(),
            None,
        );
        assert!(version.is_err());
    }
}
