//! Per-run audit trail for background jobs.
//!
//! Each job execution opens a [`JobRunAudit`], which writes the started row
//! immediately and carries the run clock, so the terminal row always lands
//! with the measured duration. Closing the trail consumes it, so a run gets
//! exactly one completed or failed row.

use super::job::JobError;
use crate::server_store::{JobAuditEventType, ServerStore};
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

pub struct JobRunAudit {
    server_store: Arc<dyn ServerStore>,
    job_id: &'static str,
    started_at: Instant,
}

impl JobRunAudit {
    /// Open the audit trail for one run, writing the started row.
    pub fn begin(
        server_store: Arc<dyn ServerStore>,
        job_id: &'static str,
        details: Option<serde_json::Value>,
    ) -> Self {
        let audit = Self {
            server_store,
            job_id,
            started_at: Instant::now(),
        };
        audit.write(JobAuditEventType::Started, None, details, None);
        audit
    }

    /// Record an intermediate milestone, e.g. one sync phase finishing.
    pub fn progress(&self, details: serde_json::Value) {
        self.write(JobAuditEventType::Progress, None, Some(details), None);
    }

    /// Close the run as successful.
    pub fn complete(self, details: Option<serde_json::Value>) {
        let elapsed = self.elapsed_ms();
        self.write(JobAuditEventType::Completed, Some(elapsed), details, None);
    }

    /// Close the run as failed and hand back the error the job returns.
    pub fn fail(self, message: String) -> JobError {
        let elapsed = self.elapsed_ms();
        self.write(
            JobAuditEventType::Failed,
            Some(elapsed),
            None,
            Some(&message),
        );
        JobError::ExecutionFailed(message)
    }

    fn elapsed_ms(&self) -> i64 {
        self.started_at.elapsed().as_millis() as i64
    }

    // Audit writes never abort a run.
    fn write(
        &self,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<serde_json::Value>,
        error: Option<&str>,
    ) {
        if let Err(e) = self.server_store.log_job_audit(
            self.job_id,
            event_type,
            duration_ms,
            details.as_ref(),
            error,
        ) {
            warn!("Audit write for job '{}' failed: {}", self.job_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_store::SqliteServerStore;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_store() -> (Arc<SqliteServerStore>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteServerStore::new(tmp.path().join("server.db")).unwrap());
        (store, tmp)
    }

    #[test]
    fn test_successful_run_leaves_full_trail() {
        let (store, _tmp) = create_test_store();

        let audit = JobRunAudit::begin(
            store.clone(),
            "catalog_sync",
            Some(json!({"wiki_enabled": false})),
        );
        audit.progress(json!({"songs_created": 2}));
        audit.complete(Some(json!({"beatmaps_created": 8})));

        let entries = store.get_job_audit_entries("catalog_sync", 10).unwrap();
        assert_eq!(entries.len(), 3);
        // newest first
        assert_eq!(entries[0].event_type, JobAuditEventType::Completed);
        assert!(entries[0].duration_ms.is_some());
        assert_eq!(entries[0].details, Some(json!({"beatmaps_created": 8})));
        assert_eq!(entries[1].event_type, JobAuditEventType::Progress);
        assert_eq!(entries[1].details, Some(json!({"songs_created": 2})));
        assert_eq!(entries[2].event_type, JobAuditEventType::Started);
        assert_eq!(entries[2].details, Some(json!({"wiki_enabled": false})));
        assert_eq!(entries[2].duration_ms, None);
    }

    #[test]
    fn test_failed_run_returns_the_job_error() {
        let (store, _tmp) = create_test_store();

        let audit = JobRunAudit::begin(store.clone(), "score_sync", None);
        let err = audit.fail("portal unreachable".to_string());
        assert!(matches!(
            err,
            JobError::ExecutionFailed(msg) if msg == "portal unreachable"
        ));

        let entries = store.get_job_audit_entries("score_sync", 10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, JobAuditEventType::Failed);
        assert_eq!(entries[0].error.as_deref(), Some("portal unreachable"));
        assert!(entries[0].duration_ms.is_some());
    }
}
