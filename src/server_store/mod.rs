mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{JobAuditEntry, JobAuditEventType, JobScheduleState};
pub use store::SqliteServerStore;
pub use trait_def::ServerStore;
