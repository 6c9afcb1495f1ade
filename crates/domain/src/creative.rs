use adtune_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

/// Delivery status of a creative or campaign on the ads platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreativeStatus {
    /// Serving impressions.
    Active,
    /// Not serving.
    Paused,
}

impl CreativeStatus {
    /// Returns stable platform value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
        }
    }

    /// Parses platform value.
    ///
    /// Archived and draft creatives do not deliver and are treated as paused.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "ACTIVE" => Ok(Self::Active),
            "PAUSED" | "ARCHIVED" | "DRAFT" | "CANCELED" => Ok(Self::Paused),
            _ => Err(AppError::Validation(format!(
                "unknown creative status '{value}'"
            ))),
        }
    }
}

/// Text content of an ad creative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreativeContent {
    /// Headline shown above the ad.
    pub headline: String,
    /// Body copy.
    pub description: String,
    /// Call-to-action label.
    pub call_to_action: String,
}

impl CreativeContent {
    /// Returns the content with the patch applied on top.
    #[must_use]
    pub fn apply(&self, patch: &ContentPatch) -> Self {
        Self {
            headline: patch
                .headline
                .clone()
                .unwrap_or_else(|| self.headline.clone()),
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| self.description.clone()),
            call_to_action: patch
                .call_to_action
                .clone()
                .unwrap_or_else(|| self.call_to_action.clone()),
        }
    }
}

/// Content changes applied to a duplicated creative.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContentPatch {
    /// Label attached to the duplicate so variations can be traced to their source.
    pub variant_label: String,
    /// Replacement headline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    /// Replacement description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Replacement call-to-action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
}

impl ContentPatch {
    /// Creates a patch that duplicates content unchanged under a variant label.
    #[must_use]
    pub fn labelled(variant_label: impl Into<String>) -> Self {
        Self {
            variant_label: variant_label.into(),
            ..Self::default()
        }
    }

    /// Returns true when the patch changes no content field.
    #[must_use]
    pub fn is_label_only(&self) -> bool {
        self.headline.is_none() && self.description.is_none() && self.call_to_action.is_none()
    }
}

/// Read-only snapshot of a creative owned by the ads platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creative {
    id: NonEmptyString,
    campaign_id: NonEmptyString,
    status: CreativeStatus,
    content: CreativeContent,
}

impl Creative {
    /// Creates a validated creative snapshot.
    pub fn new(
        id: impl Into<String>,
        campaign_id: impl Into<String>,
        status: CreativeStatus,
        content: CreativeContent,
    ) -> AppResult<Self> {
        Ok(Self {
            id: NonEmptyString::new(id)?,
            campaign_id: NonEmptyString::new(campaign_id)?,
            status,
            content,
        })
    }

    /// Returns the creative identifier.
    #[must_use]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Returns the owning campaign identifier.
    #[must_use]
    pub fn campaign_id(&self) -> &NonEmptyString {
        &self.campaign_id
    }

    /// Returns the delivery status.
    #[must_use]
    pub fn status(&self) -> CreativeStatus {
        self.status
    }

    /// Returns the text content.
    #[must_use]
    pub fn content(&self) -> &CreativeContent {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::{ContentPatch, Creative, CreativeContent, CreativeStatus};

    fn content() -> CreativeContent {
        CreativeContent {
            headline: "Ship faster".to_owned(),
            description: "Automated bidding for busy teams".to_owned(),
            call_to_action: "LEARN_MORE".to_owned(),
        }
    }

    #[test]
    fn non_delivering_statuses_parse_as_paused() {
        assert!(matches!(
            CreativeStatus::parse("ARCHIVED"),
            Ok(CreativeStatus::Paused)
        ));
        assert!(matches!(
            CreativeStatus::parse("ACTIVE"),
            Ok(CreativeStatus::Active)
        ));
        assert!(CreativeStatus::parse("paused").is_err());
    }

    #[test]
    fn patch_overrides_only_present_fields() {
        let patch = ContentPatch {
            variant_label: "v2".to_owned(),
            headline: Some("Ship even faster".to_owned()),
            ..ContentPatch::default()
        };

        let patched = content().apply(&patch);
        assert_eq!(patched.headline, "Ship even faster");
        assert_eq!(patched.description, content().description);
        assert!(!patch.is_label_only());
        assert!(ContentPatch::labelled("v3").is_label_only());
    }

    #[test]
    fn creative_requires_identifiers() {
        let creative = Creative::new(" ", "campaign-1", CreativeStatus::Active, content());
        assert!(creative.is_err());
    }
}
