//! Catalog sync background job.
//!
//! Pulls the official bulk catalog document, reconciles songs and beatmaps
//! into the catalog store, then runs the secondary wiki pass when one is
//! configured.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior},
    JobRunAudit,
};
use crate::assets::AssetStore;
use crate::config::{IntervalJobSettings, ScraperSettings, WikiSettings};
use crate::scrape::{self, CatalogSyncer, RetryPolicy, ScrapeError, WikiScraper, WikiScraperSettings};
use crate::catalog_store::CatalogStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct CatalogSyncJob {
    interval_hours: u64,
    run_at_startup: bool,
    catalog_url: String,
    http_timeout: Duration,
    syncer: CatalogSyncer,
    wiki: Option<WikiScraper>,
}

impl CatalogSyncJob {
    pub fn from_settings(
        settings: &IntervalJobSettings,
        scraper: &ScraperSettings,
        wiki: Option<&WikiSettings>,
        catalog_store: Arc<dyn CatalogStore>,
        asset_store: Option<Arc<dyn AssetStore>>,
    ) -> Result<Self, ScrapeError> {
        let http_timeout = Duration::from_secs(scraper.http_timeout_secs);
        let wiki = wiki
            .map(|w| {
                WikiScraper::new(
                    WikiScraperSettings {
                        base_url: w.base_url.clone(),
                        song_list_path: w.song_list_path.clone(),
                        deleted_songs_path: w.deleted_songs_path.clone(),
                        cache_dir: w.cache_dir.clone(),
                        retry: RetryPolicy {
                            backoff: Duration::from_secs(w.backoff_secs),
                            max_attempts: w.max_attempts,
                        },
                        page_delay: Duration::from_millis(w.page_delay_ms),
                    },
                    Arc::clone(&catalog_store),
                    http_timeout,
                )
            })
            .transpose()?;

        Ok(Self {
            interval_hours: settings.interval_hours,
            run_at_startup: settings.run_at_startup,
            catalog_url: scraper.catalog_url.clone(),
            http_timeout,
            syncer: CatalogSyncer::new(
                catalog_store,
                asset_store,
                scraper.image_base_url.clone(),
            ),
            wiki,
        })
    }
}

#[async_trait]
impl BackgroundJob for CatalogSyncJob {
    fn id(&self) -> &'static str {
        "catalog_sync"
    }

    fn name(&self) -> &'static str {
        "Catalog Sync"
    }

    fn description(&self) -> &'static str {
        "Reconcile the official song catalog and wiki chart details into the catalog store"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(Duration::from_secs(self.interval_hours * 60 * 60))
    }

    fn run_at_startup(&self) -> bool {
        self.run_at_startup
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let audit = JobRunAudit::begin(
            Arc::clone(&ctx.server_store),
            self.id(),
            Some(serde_json::json!({
                "catalog_url": self.catalog_url,
                "wiki_enabled": self.wiki.is_some(),
            })),
        );

        let client = match reqwest::Client::builder().timeout(self.http_timeout).build() {
            Ok(client) => client,
            Err(e) => return Err(audit.fail(format!("Failed to build catalog client: {}", e))),
        };

        let entries = match scrape::fetch_catalog(&client, &self.catalog_url).await {
            Ok(entries) => entries,
            Err(e) => return Err(audit.fail(format!("Failed to fetch catalog: {}", e))),
        };

        let stats = self.syncer.sync(entries);
        info!(
            "Catalog sync: {} created, {} updated, {} beatmaps, {} skipped",
            stats.songs_created, stats.songs_updated, stats.beatmaps_created, stats.entries_skipped
        );
        audit.progress(serde_json::json!({
            "songs_created": stats.songs_created,
            "songs_updated": stats.songs_updated,
            "beatmaps_created": stats.beatmaps_created,
            "entries_skipped": stats.entries_skipped,
        }));

        if let Some(wiki) = &self.wiki {
            match wiki.sync(&ctx.cancellation_token).await {
                Ok(wiki_stats) => {
                    audit.complete(Some(serde_json::json!({
                        "wiki_songs_updated": wiki_stats.songs_updated,
                        "wiki_beatmaps_upserted": wiki_stats.beatmaps_upserted,
                        "wiki_songs_skipped": wiki_stats.songs_skipped,
                        "wiki_songs_marked_deleted": wiki_stats.songs_marked_deleted,
                    })));
                }
                Err(ScrapeError::Cancelled) => return Err(JobError::Cancelled),
                Err(e) => return Err(audit.fail(format!("Wiki sync failed: {}", e))),
            }
        } else {
            audit.complete(None);
        }
        Ok(())
    }
}
