//! Scraping pipeline: portal sessions, page parsers, catalog and score sync.

pub mod catalog;
pub mod error;
pub mod normalize;
pub mod player;
pub mod scores;
pub mod session;
pub mod sync;
pub mod wiki;

pub use catalog::{fetch_catalog, CatalogSyncStats, CatalogSyncer};
pub use error::ScrapeError;
pub use session::{fetch_with_retry, PortalClient, RetryPolicy};
pub use sync::{SyncOrchestrator, SyncReport, SyncSettings};
pub use wiki::{WikiScraper, WikiScraperSettings, WikiSyncStats};
