//! Adtune worker: scheduler-invoked optimization runs and credential rotation steps.

#![forbid(unsafe_code)]

mod config;
mod secret_import;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use adtune_application::{
    ActionExecutor, AuditLog, MetricsStore, Notifier, OptimizationService, RotationRequest,
    RotationService, SecretStore,
};
use adtune_core::{AppError, AppResult};
use adtune_domain::{RotationStep, StageLabel};
use adtune_infrastructure::{
    AesSecretEncryptor, ConsoleNotifier, HttpAdsPlatform, HttpCopyGenerator,
    HttpCredentialVerifier, HttpOAuthClient, HttpScoringService, HttpWebhookNotifier,
    InMemoryAuditLog, InMemoryMetricsStore, InMemorySecretStore, PostgresAuditLog,
    PostgresMetricsStore, PostgresSecretStore,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;

/// Exit code asking the scheduler to retry the invocation.
const EXIT_RETRYABLE: u8 = 75;

#[derive(Debug, Parser)]
#[command(name = "adtune-worker", version, about = "Ads campaign optimizer worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one optimization pass and print the run report as JSON.
    Optimize {
        /// Decide and audit without mutating the ads platform.
        #[arg(long)]
        dry_run: bool,
        /// Run without a database: metrics from METRICS_FILE, credential
        /// from this JSON file, audit records kept in memory.
        #[arg(long, value_name = "CREDENTIALS_FILE")]
        local: Option<PathBuf>,
    },
    /// Run one step of the credential rotation protocol.
    Rotate {
        /// createSecret, setSecret, testSecret or finishSecret.
        #[arg(long, value_parser = parse_step)]
        step: RotationStep,
        /// Secret holding the platform credential.
        #[arg(long)]
        secret_id: String,
        /// Rotation token naming the version being rotated in.
        #[arg(long)]
        token: String,
    },
    /// Manage stored platform credentials.
    Secret {
        #[command(subcommand)]
        command: SecretCommand,
    },
}

#[derive(Debug, Subcommand)]
enum SecretCommand {
    /// Store credential JSON as the first AWSCURRENT version of a secret.
    Import {
        /// Secret receiving the credential.
        #[arg(long)]
        secret_id: String,
        /// JSON file with access_token, refresh_token, client_id and client_secret; stdin when omitted.
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn parse_step(value: &str) -> Result<RotationStep, String> {
    RotationStep::parse(value).map_err(|error| error.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let result = match WorkerConfig::load() {
        Ok(config) => match cli.command {
            Command::Optimize { dry_run, local } => optimize(config, dry_run, local).await,
            Command::Rotate {
                step,
                secret_id,
                token,
            } => {
                rotate(
                    config,
                    RotationRequest {
                        secret_id,
                        version_id: token,
                        step,
                    },
                )
                .await
            }
            Command::Secret {
                command: SecretCommand::Import { secret_id, file },
            } => import_secret(config, secret_id.as_str(), file).await,
        },
        Err(error) => Err(error),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            error!(kind = %error.kind(), error = %error, "worker failed");
            if error.is_retryable() {
                ExitCode::from(EXIT_RETRYABLE)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

/// Adapters backing one optimization run.
struct RunAdapters {
    secret_store: Arc<dyn SecretStore>,
    metrics_store: Arc<dyn MetricsStore>,
    audit_log: Arc<dyn AuditLog>,
}

async fn optimize(
    config: WorkerConfig,
    dry_run: bool,
    local: Option<PathBuf>,
) -> AppResult<ExitCode> {
    let http_client = build_http_client(&config)?;
    let adapters = match local {
        Some(credentials_file) => local_adapters(&config, credentials_file.as_path()).await?,
        None => database_adapters(&config).await?,
    };

    let credential = adapters
        .secret_store
        .get_secret(config.ads_secret_id.as_str(), StageLabel::Current)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "secret '{}' has no AWSCURRENT version",
                config.ads_secret_id
            ))
        })?;

    let platform = HttpAdsPlatform::new(
        http_client.clone(),
        config.ads_api.clone(),
        credential.credentials().access_token(),
    );
    let executor = ActionExecutor::new(Arc::new(platform), adapters.audit_log, config.executor);
    let mut service = OptimizationService::new(adapters.metrics_store, executor)
        .with_notifier(build_notifier(&config, http_client.clone()));
    if let Some(scoring_url) = &config.scoring_url {
        service = service.with_scoring_service(
            Arc::new(HttpScoringService::new(
                http_client.clone(),
                scoring_url.as_str(),
            )),
            config.scoring_timeout,
        );
    }
    if let Some(copy_generator_url) = &config.copy_generator_url {
        service = service.with_copy_generator(
            Arc::new(HttpCopyGenerator::new(
                http_client,
                copy_generator_url.as_str(),
            )),
            config.copy_generator_timeout,
        );
    }

    let policy = config.policy.clone().with_dry_run(config.policy.dry_run() || dry_run);
    let report = service.run(policy, Utc::now()).await?;
    info!(run_id = %report.run_id, "\n{}", report.render_text());

    let json = serde_json::to_string_pretty(&report).map_err(|error| {
        AppError::Internal(format!("failed to serialize run report: {error}"))
    })?;
    println!("{json}");

    if report.credential_invalid {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn database_adapters(config: &WorkerConfig) -> AppResult<RunAdapters> {
    let pool = connect_pool(config.require_database_url()?).await?;
    let metrics_store: Arc<dyn MetricsStore> = match &config.metrics_file {
        Some(path) => Arc::new(load_metrics_file(path)?),
        None => Arc::new(PostgresMetricsStore::new(pool.clone())),
    };

    Ok(RunAdapters {
        secret_store: build_secret_store(config, pool.clone())?,
        metrics_store,
        audit_log: Arc::new(PostgresAuditLog::new(pool)),
    })
}

async fn local_adapters(
    config: &WorkerConfig,
    credentials_file: &Path,
) -> AppResult<RunAdapters> {
    let metrics_file = config.metrics_file.as_ref().ok_or_else(|| {
        AppError::Validation("METRICS_FILE is required for a local run".to_owned())
    })?;
    let secret_store = InMemorySecretStore::new();
    let credentials_json = secret_import::read_credentials(Some(credentials_file))?;
    secret_import::import_current(
        &secret_store,
        config.ads_secret_id.as_str(),
        credentials_json.as_str(),
    )
    .await?;
    info!(metrics_file = %metrics_file.display(), "local run, audit records are not persisted");

    Ok(RunAdapters {
        secret_store: Arc::new(secret_store),
        metrics_store: Arc::new(load_metrics_file(metrics_file)?),
        audit_log: Arc::new(InMemoryAuditLog::new()),
    })
}

fn load_metrics_file(path: &Path) -> AppResult<InMemoryMetricsStore> {
    let json = std::fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!(
            "failed to read METRICS_FILE '{}': {error}",
            path.display()
        ))
    })?;
    InMemoryMetricsStore::from_json(json.as_str())
}

async fn import_secret(
    config: WorkerConfig,
    secret_id: &str,
    file: Option<PathBuf>,
) -> AppResult<ExitCode> {
    let credentials_json = secret_import::read_credentials(file.as_deref())?;
    let pool = connect_pool(config.require_database_url()?).await?;
    let secret_store = build_secret_store(&config, pool)?;

    let stored =
        secret_import::import_current(secret_store.as_ref(), secret_id, credentials_json.as_str())
            .await?;
    let json = serde_json::json!({
        "secret_id": secret_id,
        "version_id": stored.version_id().as_str(),
    });
    println!("{json}");

    Ok(ExitCode::SUCCESS)
}

async fn rotate(config: WorkerConfig, request: RotationRequest) -> AppResult<ExitCode> {
    let pool = connect_pool(config.require_database_url()?).await?;
    let http_client = build_http_client(&config)?;
    let secret_store = build_secret_store(&config, pool)?;

    let verifier = HttpCredentialVerifier::new(HttpAdsPlatform::new(
        http_client.clone(),
        config.ads_api.clone(),
        String::new(),
    ));
    let service = RotationService::new(
        secret_store,
        Arc::new(HttpOAuthClient::new(
            http_client.clone(),
            config.oauth_token_url.as_str(),
        )),
        Arc::new(verifier),
    )
    .with_notifier(build_notifier(&config, http_client));

    let result = service.handle(&request, Utc::now()).await?;
    let json = serde_json::to_string(&result).map_err(|error| {
        AppError::Internal(format!("failed to serialize rotation result: {error}"))
    })?;
    println!("{json}");

    Ok(ExitCode::SUCCESS)
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Transient(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_http_client(config: &WorkerConfig) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))
}

fn build_secret_store(config: &WorkerConfig, pool: PgPool) -> AppResult<Arc<dyn SecretStore>> {
    let encryptor = AesSecretEncryptor::from_hex(config.require_secret_encryption_key()?)?;
    Ok(Arc::new(PostgresSecretStore::new(pool, Arc::new(encryptor))))
}

fn build_notifier(config: &WorkerConfig, http_client: reqwest::Client) -> Arc<dyn Notifier> {
    match &config.notify_webhook_url {
        Some(webhook_url) => Arc::new(HttpWebhookNotifier::new(
            http_client,
            webhook_url.as_str(),
        )),
        None => Arc::new(ConsoleNotifier::new()),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
