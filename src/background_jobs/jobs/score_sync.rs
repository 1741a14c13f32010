//! Score sync background job.
//!
//! Runs the per-user sync loop: portal login, profile snapshot, incremental
//! score pull past each user's watermark.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior},
    JobRunAudit,
};
use crate::catalog_store::CatalogStore;
use crate::config::{IntervalJobSettings, ScraperSettings};
use crate::crypto::CredentialCipher;
use crate::scrape::{ScrapeError, SyncOrchestrator, SyncSettings};
use crate::user_store::UserStore;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct ScoreSyncJob {
    interval_hours: u64,
    run_at_startup: bool,
    orchestrator: SyncOrchestrator,
}

impl ScoreSyncJob {
    pub fn from_settings(
        settings: &IntervalJobSettings,
        scraper: &ScraperSettings,
        catalog_store: Arc<dyn CatalogStore>,
        user_store: Arc<dyn UserStore>,
        cipher: Arc<CredentialCipher>,
    ) -> Self {
        let orchestrator = SyncOrchestrator::new(
            catalog_store,
            user_store,
            cipher,
            SyncSettings {
                portal_base_url: scraper.portal_base_url.clone(),
                http_timeout: Duration::from_secs(scraper.http_timeout_secs),
                detail_delay: Duration::from_millis(scraper.detail_delay_ms),
                user_concurrency: scraper.user_concurrency,
            },
        );
        Self {
            interval_hours: settings.interval_hours,
            run_at_startup: settings.run_at_startup,
            orchestrator,
        }
    }
}

#[async_trait]
impl BackgroundJob for ScoreSyncJob {
    fn id(&self) -> &'static str {
        "score_sync"
    }

    fn name(&self) -> &'static str {
        "Score Sync"
    }

    fn description(&self) -> &'static str {
        "Pull new play records for every registered user past their watermark"
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

        let audit = JobRunAudit::begin(Arc::clone(&ctx.server_store), self.id(), None);

        match self.orchestrator.sync_all_users(&ctx.cancellation_token).await {
            Ok(report) => {
                info!(
                    "Score sync: {} users ok, {} failed, {} new scores",
                    report.users_synced, report.users_failed, report.scores_inserted
                );
                audit.complete(Some(serde_json::json!({
                    "users_synced": report.users_synced,
                    "users_failed": report.users_failed,
                    "scores_inserted": report.scores_inserted,
                    "scores_duplicate": report.scores_duplicate,
                })));
                Ok(())
            }
            Err(ScrapeError::Cancelled) => Err(JobError::Cancelled),
            Err(e) => Err(audit.fail(format!("Score sync failed: {}", e))),
        }
    }
}
