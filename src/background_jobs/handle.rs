use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Static metadata of a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Handle to a running scheduler, used for introspection and shutdown.
pub struct SchedulerHandle {
    pub(super) cancellation_token: CancellationToken,
    pub(super) jobs: Vec<JobInfo>,
    pub(super) tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn jobs(&self) -> &[JobInfo] {
        &self.jobs
    }

    /// Cancel all job loops and wait for their tasks to finish.
    pub async fn shutdown(self) {
        self.cancellation_token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Job task ended abnormally: {}", e);
            }
        }
    }
}
