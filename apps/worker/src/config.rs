use std::path::PathBuf;
use std::time::Duration;

use adtune_application::{ExecutorConfig, RetryPolicy};
use adtune_core::{AppError, AppResult};
use adtune_domain::{PolicyConfig, PolicyConfigInput};
use adtune_infrastructure::AdsApiConfig;

/// Runtime configuration read from the environment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: Option<String>,
    pub secret_encryption_key: Option<String>,
    pub ads_secret_id: String,
    pub ads_api: AdsApiConfig,
    pub oauth_token_url: String,
    pub scoring_url: Option<String>,
    pub scoring_timeout: Duration,
    pub copy_generator_url: Option<String>,
    pub copy_generator_timeout: Duration,
    pub notify_webhook_url: Option<String>,
    pub http_timeout: Duration,
    pub metrics_file: Option<PathBuf>,
    pub policy: PolicyConfig,
    pub executor: ExecutorConfig,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let env = EnvReader { lookup };
        let defaults = AdsApiConfig::default();

        let ads_api = AdsApiConfig {
            base_url: env
                .string_or("ADS_API_BASE_URL", defaults.base_url)
                .trim_end_matches('/')
                .to_owned(),
            api_version: env.string_or("ADS_API_VERSION", defaults.api_version),
            currency_code: env.string_or("ADS_CURRENCY_CODE", defaults.currency_code),
            token_check_url: env.string_or("ADS_TOKEN_CHECK_URL", defaults.token_check_url),
        };

        let policy_defaults = PolicyConfigInput::default();
        let policy = PolicyConfig::new(PolicyConfigInput {
            min_sample_size: env.parse_or("MIN_SAMPLE_SIZE", policy_defaults.min_sample_size)?,
            min_ctr: env.parse_or("MIN_CTR_THRESHOLD", policy_defaults.min_ctr)?,
            top_ctr: env.parse_or("TOP_PERFORMER_THRESHOLD", policy_defaults.top_ctr)?,
            max_cpc: env.parse_or("MAX_CPC", policy_defaults.max_cpc)?,
            bid_change_threshold: env
                .parse_or("BID_CHANGE_THRESHOLD", policy_defaults.bid_change_threshold)?,
            lookback_days: env.parse_or("LOOKBACK_DAYS", policy_defaults.lookback_days)?,
            dry_run: env.parse_bool_or("DRY_RUN", policy_defaults.dry_run)?,
            target_ctr: env.parse_or("TARGET_CTR", policy_defaults.target_ctr)?,
            target_cpc: env.parse_optional("TARGET_CPC")?,
            bid_floor: env.parse_or("BID_FLOOR", policy_defaults.bid_floor)?,
            bid_ceiling: env.parse_or("BID_CEILING", policy_defaults.bid_ceiling)?,
        })?;

        let max_in_flight: usize = env.parse_or("EXECUTOR_MAX_IN_FLIGHT", 4)?;
        let max_attempts: u8 = env.parse_or("EXECUTOR_MAX_ATTEMPTS", 3)?;
        if max_in_flight == 0 {
            return Err(AppError::Validation(
                "EXECUTOR_MAX_IN_FLIGHT must be greater than zero".to_owned(),
            ));
        }
        if max_attempts == 0 {
            return Err(AppError::Validation(
                "EXECUTOR_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }
        let executor = ExecutorConfig {
            max_in_flight,
            min_request_interval: Duration::from_millis(
                env.parse_or("EXECUTOR_MIN_REQUEST_INTERVAL_MS", 200)?,
            ),
            retry: RetryPolicy::new(
                max_attempts,
                Duration::from_millis(env.parse_or("EXECUTOR_RETRY_BASE_MS", 2_000)?),
                Duration::from_millis(env.parse_or("EXECUTOR_RETRY_MAX_MS", 30_000)?),
            ),
        };

        let http_timeout_secs: u64 = env.parse_or("HTTP_TIMEOUT_SECS", 15)?;
        if http_timeout_secs == 0 {
            return Err(AppError::Validation(
                "HTTP_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url: env.optional("DATABASE_URL"),
            secret_encryption_key: env.optional("SECRET_ENCRYPTION_KEY"),
            ads_secret_id: env.string_or("ADS_SECRET_ID", "adtune/linkedin-ads".to_owned()),
            ads_api,
            oauth_token_url: env.string_or(
                "OAUTH_TOKEN_URL",
                "https://www.linkedin.com/oauth/v2/accessToken".to_owned(),
            ),
            scoring_url: env.optional("SCORING_URL"),
            scoring_timeout: Duration::from_millis(env.parse_or("SCORING_TIMEOUT_MS", 5_000)?),
            copy_generator_url: env.optional("COPY_GENERATOR_URL"),
            copy_generator_timeout: Duration::from_millis(
                env.parse_or("COPY_GENERATOR_TIMEOUT_MS", 30_000)?,
            ),
            notify_webhook_url: env.optional("NOTIFY_WEBHOOK_URL"),
            http_timeout: Duration::from_secs(http_timeout_secs),
            metrics_file: env.optional("METRICS_FILE").map(PathBuf::from),
            policy,
            executor,
        })
    }
}

impl WorkerConfig {
    pub fn require_database_url(&self) -> AppResult<&str> {
        self.database_url
            .as_deref()
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))
    }

    pub fn require_secret_encryption_key(&self) -> AppResult<&str> {
        self.secret_encryption_key
            .as_deref()
            .ok_or_else(|| AppError::Validation("SECRET_ENCRYPTION_KEY is required".to_owned()))
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn string_or(&self, name: &str, default: String) -> String {
        self.optional(name).unwrap_or(default)
    }

    fn parse_optional<T>(&self, name: &str) -> AppResult<Option<T>>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|value| {
                value.parse::<T>().map_err(|error| {
                    AppError::Validation(format!("invalid {name} value '{value}': {error}"))
                })
            })
            .transpose()
    }

    fn parse_or<T>(&self, name: &str, default: T) -> AppResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_optional(name)?.unwrap_or(default))
    }

    fn parse_bool_or(&self, name: &str, default: bool) -> AppResult<bool> {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                _ => Err(AppError::Validation(format!(
                    "invalid {name} value '{value}': expected true or false"
                ))),
            },
        }
    }
}
