//! Background job scheduling and execution system.
//!
//! This module provides infrastructure for running periodic background tasks
//! like catalog reconciliation and per-user score sync.

mod audit;
mod context;
mod handle;
mod job;
pub mod jobs;
mod scheduler;

pub use audit::JobRunAudit;
pub use context::JobContext;
pub use handle::{JobInfo, SchedulerHandle};
pub use job::{BackgroundJob, JobError, JobSchedule, ShutdownBehavior};
pub use scheduler::{create_scheduler, JobScheduler};
