//! Specific background job implementations.
//!
//! This module contains implementations of the `BackgroundJob` trait
//! for the catalog and score sync pipelines.

pub mod catalog_sync;
pub mod score_sync;

pub use catalog_sync::CatalogSyncJob;
pub use score_sync::ScoreSyncJob;
