//! ServerStore trait definition.

use super::models::{JobAuditEntry, JobAuditEventType, JobScheduleState};
use anyhow::Result;

/// Trait for server-side state storage (job history, schedules).
pub trait ServerStore: Send + Sync {
    /// Append one audit event for a job run.
    fn log_job_audit(
        &self,
        job_id: &str,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<()>;

    /// Most recent audit events for a job, newest first.
    fn get_job_audit_entries(&self, job_id: &str, limit: usize) -> Result<Vec<JobAuditEntry>>;

    fn get_schedule_state(&self, job_id: &str) -> Result<Option<JobScheduleState>>;

    fn update_schedule_state(&self, state: &JobScheduleState) -> Result<()>;
}
