use adtune_core::{AppError, AppResult, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of subject a performance window or action refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    /// One ad creative.
    #[default]
    Creative,
    /// One campaign, the unit bids are set on.
    Campaign,
}

impl SubjectKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creative => "creative",
            Self::Campaign => "campaign",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "creative" => Ok(Self::Creative),
            "campaign" => Ok(Self::Campaign),
            _ => Err(AppError::Validation(format!(
                "unknown subject kind '{value}'"
            ))),
        }
    }
}

/// Raw metrics row as delivered by the metrics store.
///
/// Nothing is validated here; [`PerformanceWindow::from_record`] is the only
/// way a row reaches decision logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Creative or campaign identifier.
    pub subject_id: String,
    /// Subject kind, creative when omitted.
    #[serde(default)]
    pub subject_kind: SubjectKind,
    /// Owning campaign. Required for creatives.
    #[serde(default)]
    pub campaign_id: Option<String>,
    /// Inclusive window start.
    pub window_start: DateTime<Utc>,
    /// Exclusive window end.
    pub window_end: DateTime<Utc>,
    /// Impressions served in the window.
    pub impressions: i64,
    /// Clicks recorded in the window.
    pub clicks: i64,
    /// Spend in account currency.
    pub cost: f64,
    /// Conversions attributed to the window.
    #[serde(default)]
    pub conversions: i64,
}

/// Validated, immutable metrics for one subject over a trailing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceWindow {
    subject_id: NonEmptyString,
    subject_kind: SubjectKind,
    campaign_id: NonEmptyString,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    impressions: u64,
    clicks: u64,
    cost: f64,
    conversions: u64,
}

impl PerformanceWindow {
    /// Validates a raw metrics row.
    pub fn from_record(record: PerformanceRecord) -> AppResult<Self> {
        let PerformanceRecord {
            subject_id,
            subject_kind,
            campaign_id,
            window_start,
            window_end,
            impressions,
            clicks,
            cost,
            conversions,
        } = record;

        let subject_id = NonEmptyString::new(subject_id)
            .map_err(|_| AppError::Validation("subject_id must not be empty".to_owned()))?;
        let campaign_id = match (subject_kind, campaign_id) {
            (SubjectKind::Campaign, None) => subject_id.clone(),
            (_, Some(campaign_id)) => NonEmptyString::new(campaign_id).map_err(|_| {
                AppError::Validation(format!(
                    "creative '{}' has an empty campaign_id",
                    subject_id.as_str()
                ))
            })?,
            (SubjectKind::Creative, None) => {
                return Err(AppError::Validation(format!(
                    "creative '{}' is missing campaign_id",
                    subject_id.as_str()
                )));
            }
        };

        if subject_kind == SubjectKind::Campaign && campaign_id != subject_id {
            return Err(AppError::Validation(format!(
                "campaign window '{}' names a different campaign_id '{}'",
                subject_id.as_str(),
                campaign_id.as_str()
            )));
        }

        if window_end <= window_start {
            return Err(AppError::Validation(format!(
                "window for '{}' ends before it starts",
                subject_id.as_str()
            )));
        }

        let impressions = non_negative("impressions", subject_id.as_str(), impressions)?;
        let clicks = non_negative("clicks", subject_id.as_str(), clicks)?;
        let conversions = non_negative("conversions", subject_id.as_str(), conversions)?;

        if clicks > impressions {
            return Err(AppError::Validation(format!(
                "window for '{}' has more clicks ({clicks}) than impressions ({impressions})",
                subject_id.as_str()
            )));
        }

        if !cost.is_finite() || cost < 0.0 {
            return Err(AppError::Validation(format!(
                "window for '{}' has invalid cost {cost}",
                subject_id.as_str()
            )));
        }

        Ok(Self {
            subject_id,
            subject_kind,
            campaign_id,
            window_start,
            window_end,
            impressions,
            clicks,
            cost,
            conversions,
        })
    }

    /// Combines two windows of the same subject into one spanning both.
    pub fn merge(&self, other: &Self) -> AppResult<Self> {
        if self.subject_id != other.subject_id || self.subject_kind != other.subject_kind {
            return Err(AppError::Validation(format!(
                "cannot merge windows of '{}' and '{}'",
                self.subject_id.as_str(),
                other.subject_id.as_str()
            )));
        }

        if self.campaign_id != other.campaign_id {
            return Err(AppError::Validation(format!(
                "creative '{}' reported under campaigns '{}' and '{}'",
                self.subject_id.as_str(),
                self.campaign_id.as_str(),
                other.campaign_id.as_str()
            )));
        }

        Ok(Self {
            subject_id: self.subject_id.clone(),
            subject_kind: self.subject_kind,
            campaign_id: self.campaign_id.clone(),
            window_start: self.window_start.min(other.window_start),
            window_end: self.window_end.max(other.window_end),
            impressions: self.impressions.saturating_add(other.impressions),
            clicks: self.clicks.saturating_add(other.clicks),
            cost: self.cost + other.cost,
            conversions: self.conversions.saturating_add(other.conversions),
        })
    }

    /// Rolls creative windows of one campaign up into a campaign window.
    pub fn rollup_campaign<'a>(
        creatives: impl IntoIterator<Item = &'a PerformanceWindow>,
    ) -> AppResult<Self> {
        let mut rollup: Option<Self> = None;
        for creative in creatives {
            if creative.subject_kind != SubjectKind::Creative {
                return Err(AppError::Validation(format!(
                    "'{}' is not a creative window",
                    creative.subject_id.as_str()
                )));
            }

            let as_campaign = Self {
                subject_id: creative.campaign_id.clone(),
                subject_kind: SubjectKind::Campaign,
                ..creative.clone()
            };
            rollup = Some(match rollup {
                Some(current) => current.merge(&as_campaign)?,
                None => as_campaign,
            });
        }

        rollup.ok_or_else(|| {
            AppError::Validation("campaign rollup requires at least one creative".to_owned())
        })
    }

    /// Returns the subject identifier.
    #[must_use]
    pub fn subject_id(&self) -> &NonEmptyString {
        &self.subject_id
    }

    /// Returns the subject kind.
    #[must_use]
    pub fn subject_kind(&self) -> SubjectKind {
        self.subject_kind
    }

    /// Returns the owning campaign (the subject itself for campaign windows).
    #[must_use]
    pub fn campaign_id(&self) -> &NonEmptyString {
        &self.campaign_id
    }

    /// Returns the window start.
    #[must_use]
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Returns the window end.
    #[must_use]
    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_end
    }

    /// Returns impressions.
    #[must_use]
    pub fn impressions(&self) -> u64 {
        self.impressions
    }

    /// Returns clicks.
    #[must_use]
    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    /// Returns spend.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Returns conversions.
    #[must_use]
    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    /// Click-through rate as a ratio, zero without impressions.
    #[must_use]
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            return 0.0;
        }

        self.clicks as f64 / self.impressions as f64
    }

    /// Click-through rate in percent, the unit policy thresholds use.
    #[must_use]
    pub fn ctr_percent(&self) -> f64 {
        self.ctr() * 100.0
    }

    /// Cost per click, undefined without clicks.
    #[must_use]
    pub fn cpc(&self) -> Option<f64> {
        (self.clicks > 0).then(|| self.cost / self.clicks as f64)
    }

    /// Cost per acquisition, undefined without conversions.
    #[must_use]
    pub fn cpa(&self) -> Option<f64> {
        (self.conversions > 0).then(|| self.cost / self.conversions as f64)
    }
}

fn non_negative(field: &str, subject_id: &str, value: i64) -> AppResult<u64> {
    u64::try_from(value).map_err(|_| {
        AppError::Validation(format!(
            "window for '{subject_id}' has negative {field} ({value})"
        ))
    })
}
