pub mod assets;
pub mod background_jobs;
pub mod catalog_store;
pub mod config;
pub mod crypto;
pub mod scrape;
pub mod server_store;
pub mod sqlite_persistence;
pub mod user_store;
