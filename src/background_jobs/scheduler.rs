//! Interval-based job scheduling with persisted last-run state.

use super::context::JobContext;
use super::handle::{JobInfo, SchedulerHandle};
use super::job::{BackgroundJob, JobError, JobSchedule};
use crate::server_store::JobScheduleState;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct JobScheduler {
    context: JobContext,
    jobs: Vec<Arc<dyn BackgroundJob>>,
}

impl JobScheduler {
    pub fn new(context: JobContext) -> Self {
        Self {
            context,
            jobs: Vec::new(),
        }
    }

    pub fn register(&mut self, job: Arc<dyn BackgroundJob>) {
        info!("Registered background job '{}' ({})", job.name(), job.id());
        self.jobs.push(job);
    }

    /// Spawn one task per registered job and return a shutdown handle.
    pub fn start(self) -> SchedulerHandle {
        let infos = self
            .jobs
            .iter()
            .map(|job| JobInfo {
                id: job.id(),
                name: job.name(),
                description: job.description(),
            })
            .collect();

        let tasks = self
            .jobs
            .into_iter()
            .map(|job| {
                let ctx = self.context.clone();
                tokio::spawn(run_job_loop(job, ctx))
            })
            .collect();

        SchedulerHandle {
            cancellation_token: self.context.cancellation_token.clone(),
            jobs: infos,
            tasks,
        }
    }
}

/// Create a scheduler with the given jobs registered.
pub fn create_scheduler(context: JobContext, jobs: Vec<Arc<dyn BackgroundJob>>) -> JobScheduler {
    let mut scheduler = JobScheduler::new(context);
    for job in jobs {
        scheduler.register(job);
    }
    scheduler
}

async fn run_job_loop(job: Arc<dyn BackgroundJob>, ctx: JobContext) {
    let JobSchedule::Interval(interval) = job.schedule();
    let mut delay = initial_delay(job.as_ref(), &ctx, interval);

    loop {
        tokio::select! {
            _ = ctx.cancellation_token.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }

        info!("Running background job '{}'", job.name());
        match job.execute(&ctx).await {
            Ok(()) => {}
            Err(JobError::Cancelled) => {
                info!("Job '{}' cancelled", job.name());
                return;
            }
            Err(JobError::ExecutionFailed(e)) => {
                warn!("Job '{}' failed: {}", job.name(), e);
            }
        }

        // failed runs also count as runs for scheduling purposes
        let state = JobScheduleState {
            job_id: job.id().to_string(),
            last_run_at: Some(Utc::now()),
        };
        if let Err(e) = ctx.server_store.update_schedule_state(&state) {
            warn!("Failed to persist schedule state for '{}': {}", job.id(), e);
        }
        delay = interval;
    }
}

/// Time until the first run. Startup jobs run immediately; the rest resume
/// their interval from the persisted last run.
fn initial_delay(job: &dyn BackgroundJob, ctx: &JobContext, interval: Duration) -> Duration {
    if job.run_at_startup() {
        return Duration::ZERO;
    }

    let last_run_at = match ctx.server_store.get_schedule_state(job.id()) {
        Ok(Some(state)) => state.last_run_at,
        Ok(None) => None,
        Err(e) => {
            warn!("Failed to read schedule state for '{}': {}", job.id(), e);
            None
        }
    };

    match last_run_at {
        Some(last) => {
            let elapsed = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
            interval.saturating_sub(elapsed)
        }
        None => Duration::ZERO,
    }
}
