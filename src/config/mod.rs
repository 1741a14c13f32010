mod file_config;

pub use file_config::{
    AssetsConfig, BackgroundJobsConfig, FileConfig, IntervalJobConfig, ScraperConfig, WikiConfig,
};

use anyhow::{bail, Result};
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    /// Base64-encoded 32-byte credential encryption key.
    pub credentials_key: String,

    // Feature configs (with defaults)
    pub scraper: ScraperSettings,
    pub background_jobs: BackgroundJobsSettings,
    pub assets: Option<AssetSettings>,
    pub wiki: Option<WikiSettings>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present; `SECRET_KEY` in the
    /// environment overrides the key from the file.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let credentials_key = std::env::var("SECRET_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or(file.credentials_key)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "credential key must be specified via SECRET_KEY or credentials_key"
                )
            })?;

        // Scraper settings from file config
        let scraper_file = file.scraper.unwrap_or_default();
        let scraper_defaults = ScraperSettings::default();
        let scraper = ScraperSettings {
            portal_base_url: scraper_file
                .portal_base_url
                .unwrap_or(scraper_defaults.portal_base_url),
            catalog_url: scraper_file
                .catalog_url
                .unwrap_or(scraper_defaults.catalog_url),
            image_base_url: scraper_file
                .image_base_url
                .unwrap_or(scraper_defaults.image_base_url),
            http_timeout_secs: scraper_file
                .http_timeout_secs
                .unwrap_or(scraper_defaults.http_timeout_secs),
            detail_delay_ms: scraper_file
                .detail_delay_ms
                .unwrap_or(scraper_defaults.detail_delay_ms),
            user_concurrency: scraper_file
                .user_concurrency
                .unwrap_or(scraper_defaults.user_concurrency)
                .max(1),
        };

        // Background jobs settings from file config
        let bg_jobs_file = file.background_jobs.unwrap_or_default();
        let resolve_interval = |file: Option<IntervalJobConfig>| {
            let file = file.unwrap_or_default();
            let defaults = IntervalJobSettings::default();
            IntervalJobSettings {
                interval_hours: file.interval_hours.unwrap_or(defaults.interval_hours),
                run_at_startup: file.run_at_startup.unwrap_or(defaults.run_at_startup),
            }
        };
        let background_jobs = BackgroundJobsSettings {
            catalog_sync: resolve_interval(bg_jobs_file.catalog_sync),
            score_sync: resolve_interval(bg_jobs_file.score_sync),
        };

        // Assets are optional: only active when enabled with an endpoint
        let assets = file.assets.and_then(|a| {
            if !a.enabled.unwrap_or(false) {
                return None;
            }
            let endpoint = a.endpoint?;
            let bucket = a.bucket?;
            Some(AssetSettings { endpoint, bucket })
        });

        // Wiki path is optional as well
        let wiki = file.wiki.and_then(|w| {
            if !w.enabled.unwrap_or(false) {
                return None;
            }
            let defaults = WikiSettings::default();
            Some(WikiSettings {
                base_url: w.base_url.unwrap_or(defaults.base_url),
                song_list_path: w.song_list_path.unwrap_or(defaults.song_list_path),
                deleted_songs_path: w.deleted_songs_path.unwrap_or(defaults.deleted_songs_path),
                cache_dir: w.cache_dir.map(PathBuf::from),
                backoff_secs: w.backoff_secs.unwrap_or(defaults.backoff_secs),
                max_attempts: w.max_attempts.unwrap_or(defaults.max_attempts),
                page_delay_ms: w.page_delay_ms.unwrap_or(defaults.page_delay_ms),
            })
        });

        Ok(Self {
            db_dir,
            credentials_key,
            scraper,
            background_jobs,
            assets,
            wiki,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join("catalog.db")
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }

    pub fn server_db_path(&self) -> PathBuf {
        self.db_dir.join("server.db")
    }
}

/// Settings for the portal and catalog scrapers.
#[derive(Debug, Clone)]
pub struct ScraperSettings {
    pub portal_base_url: String,
    pub catalog_url: String,
    /// Base URL cover image filenames are appended to when mirroring.
    pub image_base_url: String,
    pub http_timeout_secs: u64,
    /// Politeness delay between per-play detail fetches.
    pub detail_delay_ms: u64,
    pub user_concurrency: usize,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            portal_base_url: "https://maimaidx.jp/maimai-mobile".to_string(),
            catalog_url: "https://maimai.sega.jp/data/maimai_songs.json".to_string(),
            image_base_url: "https://maimaidx.jp/maimai-mobile/img/Music/".to_string(),
            http_timeout_secs: 30,
            detail_delay_ms: 1000,
            user_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackgroundJobsSettings {
    pub catalog_sync: IntervalJobSettings,
    pub score_sync: IntervalJobSettings,
}

/// Settings for jobs that only need interval configuration.
#[derive(Debug, Clone)]
pub struct IntervalJobSettings {
    pub interval_hours: u64,
    pub run_at_startup: bool,
}

impl Default for IntervalJobSettings {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            run_at_startup: true,
        }
    }
}

/// Settings for the S3-compatible asset bucket.
#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub endpoint: String,
    pub bucket: String,
}

/// Settings for the secondary wiki catalog source.
#[derive(Debug, Clone)]
pub struct WikiSettings {
    pub base_url: String,
    pub song_list_path: String,
    pub deleted_songs_path: String,
    pub cache_dir: Option<PathBuf>,
    pub backoff_secs: u64,
    pub max_attempts: u32,
    pub page_delay_ms: u64,
}

impl Default for WikiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://gamerch.com/maimai".to_string(),
            song_list_path: "/545589".to_string(),
            deleted_songs_path: "/533442".to_string(),
            cache_dir: None,
            backoff_secs: 30,
            max_attempts: 5,
            page_delay_ms: 1000,
        }
    }
}
