use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub logging_level: Option<String>,
    /// Base64-encoded 32-byte credential encryption key. The `SECRET_KEY`
    /// environment variable takes precedence.
    pub credentials_key: Option<String>,

    // Feature configs
    pub scraper: Option<ScraperConfig>,
    pub background_jobs: Option<BackgroundJobsConfig>,
    pub assets: Option<AssetsConfig>,
    pub wiki: Option<WikiConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ScraperConfig {
    pub portal_base_url: Option<String>,
    pub catalog_url: Option<String>,
    pub image_base_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub detail_delay_ms: Option<u64>,
    pub user_concurrency: Option<usize>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub catalog_sync: Option<IntervalJobConfig>,
    pub score_sync: Option<IntervalJobConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct IntervalJobConfig {
    pub interval_hours: Option<u64>,
    pub run_at_startup: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AssetsConfig {
    pub enabled: Option<bool>,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct WikiConfig {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub song_list_path: Option<String>,
    pub deleted_songs_path: Option<String>,
    pub cache_dir: Option<String>,
    pub backoff_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub page_delay_ms: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
