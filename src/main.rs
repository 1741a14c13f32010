use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use maimai_stats_server::assets::{AssetStore, HttpAssetStore};
use maimai_stats_server::background_jobs::jobs::{CatalogSyncJob, ScoreSyncJob};
use maimai_stats_server::background_jobs::{create_scheduler, BackgroundJob, JobContext};
use maimai_stats_server::catalog_store::{CatalogStore, SqliteCatalogStore};
use maimai_stats_server::config;
use maimai_stats_server::crypto::CredentialCipher;
use maimai_stats_server::server_store::{ServerStore, SqliteServerStore};
use maimai_stats_server::user_store::{SqliteUserStore, UserStore};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing database files (catalog.db, user.db, server.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  portal: {}", app_config.scraper.portal_base_url);
    info!("  wiki enabled: {}", app_config.wiki.is_some());

    let cipher = Arc::new(CredentialCipher::from_base64_key(
        &app_config.credentials_key,
    )?);

    // Create stores (DBs are created on first open)
    if !app_config.catalog_db_path().exists() {
        info!(
            "Creating new catalog database at {:?}",
            app_config.catalog_db_path()
        );
    }
    let catalog_store = Arc::new(SqliteCatalogStore::new(app_config.catalog_db_path())?);

    if !app_config.user_db_path().exists() {
        info!(
            "Creating new user database at {:?}",
            app_config.user_db_path()
        );
    }
    let user_store = Arc::new(SqliteUserStore::new(app_config.user_db_path())?);

    info!(
        "Initializing server store at {:?}",
        app_config.server_db_path()
    );
    let server_store = Arc::new(SqliteServerStore::new(app_config.server_db_path())?);

    // Asset mirroring is optional
    let asset_store: Option<Arc<dyn AssetStore>> = match &app_config.assets {
        Some(settings) => {
            info!("Asset mirroring enabled ({})", settings.endpoint);
            match HttpAssetStore::new(
                &settings.endpoint,
                &settings.bucket,
                Duration::from_secs(app_config.scraper.http_timeout_secs),
            ) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    error!("Failed to build asset store, mirroring disabled: {:?}", e);
                    None
                }
            }
        }
        None => None,
    };

    // Set up background job scheduler
    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(
        shutdown_token.child_token(),
        catalog_store.clone() as Arc<dyn CatalogStore>,
        user_store.clone() as Arc<dyn UserStore>,
        server_store.clone() as Arc<dyn ServerStore>,
    );

    let catalog_sync_job = CatalogSyncJob::from_settings(
        &app_config.background_jobs.catalog_sync,
        &app_config.scraper,
        app_config.wiki.as_ref(),
        catalog_store.clone() as Arc<dyn CatalogStore>,
        asset_store,
    )?;
    let score_sync_job = ScoreSyncJob::from_settings(
        &app_config.background_jobs.score_sync,
        &app_config.scraper,
        catalog_store.clone() as Arc<dyn CatalogStore>,
        user_store.clone() as Arc<dyn UserStore>,
        cipher,
    );

    let scheduler = create_scheduler(
        job_context,
        vec![
            Arc::new(catalog_sync_job) as Arc<dyn BackgroundJob>,
            Arc::new(score_sync_job) as Arc<dyn BackgroundJob>,
        ],
    );
    let handle = scheduler.start();
    info!("Job scheduler started with {} job(s)", handle.jobs().len());

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, initiating graceful shutdown");
    shutdown_token.cancel();
    handle.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}
