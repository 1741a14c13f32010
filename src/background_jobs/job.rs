//! Core background job abstractions.

use super::context::JobContext;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// When a job should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobSchedule {
    /// Run every `Duration`, measured from the end of the previous run.
    Interval(Duration),
}

/// How a job reacts to server shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownBehavior {
    /// The job observes the cancellation token and stops mid-run.
    Cancellable,
    /// The scheduler waits for the current run to finish.
    WaitForCompletion,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job was cancelled")]
    Cancelled,
    #[error("job execution failed: {0}")]
    ExecutionFailed(String),
}

/// A unit of scheduled background work.
///
/// Jobs are registered with the [`JobScheduler`](super::JobScheduler), which
/// runs each on its own task and persists last-run timestamps so intervals
/// survive restarts.
#[async_trait]
pub trait BackgroundJob: Send + Sync {
    /// Stable identifier, used as the audit log and schedule state key.
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn schedule(&self) -> JobSchedule;

    /// Whether the job also runs once immediately when the scheduler starts.
    fn run_at_startup(&self) -> bool {
        false
    }

    fn shutdown_behavior(&self) -> ShutdownBehavior {
        ShutdownBehavior::Cancellable
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError>;
}
