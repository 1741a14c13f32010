//! SQLite schema definitions for the server database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const JOB_AUDIT_LOG_TABLE: Table = Table {
    name: "job_audit_log",
    columns: &[
        // rowid alias
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("job_id", &SqlType::Text, non_null = true),
        sqlite_column!("event_type", &SqlType::Text, non_null = true),
        sqlite_column!("duration_ms", &SqlType::Integer),
        sqlite_column!("details", &SqlType::Text), // JSON
        sqlite_column!("error", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &["CREATE INDEX job_audit_job_index ON job_audit_log (job_id, created_at);"],
    unique_constraints: &[],
};

const JOB_SCHEDULE_STATE_TABLE: Table = Table {
    name: "job_schedule_state",
    columns: &[
        sqlite_column!("job_id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("last_run_at", &SqlType::Text),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub const SERVER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[JOB_AUDIT_LOG_TABLE, JOB_SCHEDULE_STATE_TABLE],
    migration: None,
}];
