use adtune_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Thresholds and switches governing one optimization run.
///
/// CTR thresholds are percentages (`1.0` means 1%), money values are in the
/// account currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    min_sample_size: u64,
    min_ctr: f64,
    top_ctr: f64,
    max_cpc: f64,
    bid_change_threshold: f64,
    lookback_days: u32,
    dry_run: bool,
    target_ctr: f64,
    target_cpc: Option<f64>,
    bid_floor: f64,
    bid_ceiling: f64,
}

/// Input payload used to construct a validated policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyConfigInput {
    /// Minimum clicks before a creative may be paused or scaled.
    pub min_sample_size: u64,
    /// Pause creatives whose CTR percent falls below this value.
    pub min_ctr: f64,
    /// Scale creatives whose CTR percent exceeds this value.
    pub top_ctr: f64,
    /// Pause creatives whose cost per click exceeds this value.
    pub max_cpc: f64,
    /// Minimum absolute bid delta worth sending to the platform.
    pub bid_change_threshold: f64,
    /// Trailing metrics period.
    pub lookback_days: u32,
    /// Decide without issuing mutating platform calls.
    pub dry_run: bool,
    /// CTR percent the bid heuristic steers toward.
    pub target_ctr: f64,
    /// Explicit CPC target for the bid heuristic.
    pub target_cpc: Option<f64>,
    /// Lowest bid ever proposed.
    pub bid_floor: f64,
    /// Highest bid ever proposed.
    pub bid_ceiling: f64,
}

impl Default for PolicyConfigInput {
    fn default() -> Self {
        Self {
            min_sample_size: 100,
            min_ctr: 1.0,
            top_ctr: 3.0,
            max_cpc: 8.0,
            bid_change_threshold: 0.5,
            lookback_days: 7,
            dry_run: false,
            target_ctr: 2.0,
            target_cpc: None,
            bid_floor: 1.0,
            bid_ceiling: 15.0,
        }
    }
}

impl PolicyConfig {
    /// Creates a validated policy.
    pub fn new(input: PolicyConfigInput) -> AppResult<Self> {
        let PolicyConfigInput {
            min_sample_size,
            min_ctr,
            top_ctr,
            max_cpc,
            bid_change_threshold,
            lookback_days,
            dry_run,
            target_ctr,
            target_cpc,
            bid_floor,
            bid_ceiling,
        } = input;

        for (name, value) in [
            ("min_ctr", min_ctr),
            ("top_ctr", top_ctr),
            ("max_cpc", max_cpc),
            ("bid_change_threshold", bid_change_threshold),
            ("target_ctr", target_ctr),
            ("bid_floor", bid_floor),
            ("bid_ceiling", bid_ceiling),
        ] {
            require_non_negative(name, value)?;
        }

        if let Some(target_cpc) = target_cpc {
            require_non_negative("target_cpc", target_cpc)?;
        }

        if min_ctr > top_ctr {
            return Err(AppError::Validation(format!(
                "min_ctr ({min_ctr}) must not exceed top_ctr ({top_ctr})"
            )));
        }

        if lookback_days == 0 {
            return Err(AppError::Validation(
                "lookback_days must be greater than zero".to_owned(),
            ));
        }

        if bid_floor > bid_ceiling {
            return Err(AppError::Validation(format!(
                "bid_floor ({bid_floor}) must not exceed bid_ceiling ({bid_ceiling})"
            )));
        }

        Ok(Self {
            min_sample_size,
            min_ctr,
            top_ctr,
            max_cpc,
            bid_change_threshold,
            lookback_days,
            dry_run,
            target_ctr,
            target_cpc,
            bid_floor,
            bid_ceiling,
        })
    }

    /// Returns the minimum click sample for pause/scale decisions.
    #[must_use]
    pub fn min_sample_size(&self) -> u64 {
        self.min_sample_size
    }

    /// Returns the low-CTR pause threshold in percent.
    #[must_use]
    pub fn min_ctr(&self) -> f64 {
        self.min_ctr
    }

    /// Returns the scale threshold in percent.
    #[must_use]
    pub fn top_ctr(&self) -> f64 {
        self.top_ctr
    }

    /// Returns the cost-per-click ceiling.
    #[must_use]
    pub fn max_cpc(&self) -> f64 {
        self.max_cpc
    }

    /// Returns the minimum bid delta.
    #[must_use]
    pub fn bid_change_threshold(&self) -> f64 {
        self.bid_change_threshold
    }

    /// Returns the trailing metrics period in days.
    #[must_use]
    pub fn lookback_days(&self) -> u32 {
        self.lookback_days
    }

    /// Returns whether mutating calls are suppressed.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Returns the CTR percent the bid heuristic steers toward.
    #[must_use]
    pub fn target_ctr(&self) -> f64 {
        self.target_ctr
    }

    /// Returns the explicit CPC target, if configured.
    #[must_use]
    pub fn target_cpc(&self) -> Option<f64> {
        self.target_cpc
    }

    /// Returns the lowest proposable bid.
    #[must_use]
    pub fn bid_floor(&self) -> f64 {
        self.bid_floor
    }

    /// Returns the highest proposable bid.
    #[must_use]
    pub fn bid_ceiling(&self) -> f64 {
        self.bid_ceiling
    }

    /// Returns a copy with the dry-run flag replaced.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

fn require_non_negative(name: &str, value: f64) -> AppResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::Validation(format!(
            "{name} must be a finite non-negative number, got {value}"
        )));
    }

    Ok(())
}
