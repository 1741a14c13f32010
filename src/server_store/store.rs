//! SQLite-backed server store implementation.

use super::models::{JobAuditEntry, JobAuditEventType, JobScheduleState};
use super::schema::SERVER_VERSIONED_SCHEMAS;
use super::trait_def::ServerStore;
use crate::sqlite_persistence::{column_error, migrate_if_needed, parse_datetime, parse_opt_datetime};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// SQLite-backed server store.
#[derive(Clone)]
pub struct SqliteServerStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteServerStore {
    /// Create a new SqliteServerStore.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open server database")?;

        migrate_if_needed(&mut write_conn, SERVER_VERSIONED_SCHEMAS, "server")?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on server write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open server database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on server read connection")?;

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

fn parse_details(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|json| {
        serde_json::from_str(&json)
            .map_err(|e| warn!("Malformed JSON details in audit log: {}", e))
            .ok()
    })
}

impl ServerStore for SqliteServerStore {
    fn log_job_audit(
        &self,
        job_id: &str,
        event_type: JobAuditEventType,
        duration_ms: Option<i64>,
        details: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO job_audit_log (job_id, event_type, duration_ms, details, error, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job_id,
                event_type.as_str(),
                duration_ms,
                details.map(|d| d.to_string()),
                error,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_job_audit_entries(&self, job_id: &str, limit: usize) -> Result<Vec<JobAuditEntry>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, job_id, event_type, duration_ms, details, error, created_at
             FROM job_audit_log WHERE job_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![job_id, limit], |row| {
                let event_type: String = row.get(2)?;
                let event_type = JobAuditEventType::parse(&event_type).ok_or_else(|| {
                    column_error(2, format!("unknown audit event type '{}'", event_type))
                })?;
                Ok(JobAuditEntry {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    event_type,
                    duration_ms: row.get(3)?,
                    details: parse_details(row.get(4)?),
                    error: row.get(5)?,
                    created_at: parse_datetime(6, row.get(6)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn get_schedule_state(&self, job_id: &str) -> Result<Option<JobScheduleState>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT job_id, last_run_at FROM job_schedule_state WHERE job_id = ?1",
        )?;
        let result = stmt
            .query_row(params![job_id], |row| {
                Ok(JobScheduleState {
                    job_id: row.get(0)?,
                    last_run_at: parse_opt_datetime(1, row.get(1)?)?,
                })
            })
            .optional()?;
        Ok(result)
    }

    fn update_schedule_state(&self, state: &JobScheduleState) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO job_schedule_state (job_id, last_run_at) VALUES (?1, ?2)",
            params![
                state.job_id,
                state.last_run_at.map(|d| d.to_rfc3339()),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn create_test_store() -> (SqliteServerStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("server.db");
        let store = SqliteServerStore::new(&db_path).unwrap();
        (store, tmp)
    }

    #[test]
    fn test_audit_log_round_trip() {
        let (store, _tmp) = create_test_store();

        store
            .log_job_audit("score_sync", JobAuditEventType::Started, None, None, None)
            .unwrap();
        store
            .log_job_audit(
                "score_sync",
                JobAuditEventType::Completed,
                Some(1234),
                Some(&serde_json::json!({"users_synced": 3})),
                None,
            )
            .unwrap();
        store
            .log_job_audit(
                "catalog_sync",
                JobAuditEventType::Failed,
                Some(88),
                None,
                Some("boom"),
            )
            .unwrap();

        let entries = store.get_job_audit_entries("score_sync", 10).unwrap();
        assert_eq!(entries.len(), 2);
        // newest first
        assert_eq!(entries[0].event_type, JobAuditEventType::Completed);
        assert_eq!(entries[0].duration_ms, Some(1234));
        assert_eq!(
            entries[0].details,
            Some(serde_json::json!({"users_synced": 3}))
        );
        assert_eq!(entries[1].event_type, JobAuditEventType::Started);

        let failed = store.get_job_audit_entries("catalog_sync", 10).unwrap();
        assert_eq!(failed[0].error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_schedule_state_upsert() {
        let (store, _tmp) = create_test_store();

        assert!(store.get_schedule_state("score_sync").unwrap().is_none());

        let mut state = JobScheduleState {
            job_id: "score_sync".to_string(),
            last_run_at: None,
        };
        store.update_schedule_state(&state).unwrap();
        assert_eq!(
            store.get_schedule_state("score_sync").unwrap().unwrap(),
            state
        );

        state.last_run_at = Some(Utc.with_ymd_and_hms(2025, 3, 1, 4, 0, 0).unwrap());
        store.update_schedule_state(&state).unwrap();
        assert_eq!(
            store.get_schedule_state("score_sync").unwrap().unwrap(),
            state
        );
    }
}
