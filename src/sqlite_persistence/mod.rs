//! Versioned SQLite schema machinery shared by all stores.
//!
//! Each store declares its tables as `const` data and opens its database
//! through [`migrate_if_needed`], which creates the schema on first open and
//! replays migrations on version bumps. The on-disk version is offset by
//! [`BASE_DB_VERSION`] so a plain SQLite file (user_version 0) is never
//! mistaken for a version-0 schema.

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub const BASE_DB_VERSION: i32 = 199;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: &'static SqlType,
    pub non_null: bool,
    pub is_primary_key: bool,
    pub default_value: Option<&'static str>,
}

/// Declare a [`Column`] with optional named overrides:
///
/// ```ignore
/// sqlite_column!("title", &SqlType::Text, non_null = true)
/// ```
#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)* $(,)?) => {{
        #[allow(unused_mut)]
        let mut column = $crate::sqlite_persistence::Column {
            name: $name,
            sql_type: $sql_type,
            non_null: false,
            is_primary_key: false,
            default_value: None,
        };
        $(column.$field = $value;)*
        column
    }};
}

#[derive(Debug, Clone, Copy)]
pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [&'static str],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create_sql(&self) -> String {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let mut part = format!("{} {}", c.name, c.sql_type.as_sql());
                if c.non_null {
                    part.push_str(" NOT NULL");
                }
                if let Some(default) = c.default_value {
                    part.push_str(" DEFAULT ");
                    part.push_str(default);
                }
                part
            })
            .collect();

        let primary_keys: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name)
            .collect();
        if !primary_keys.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", primary_keys.join(", ")));
        }
        for unique in self.unique_constraints {
            parts.push(format!("UNIQUE ({})", unique.join(", ")));
        }

        format!("CREATE TABLE {} ({})", self.name, parts.join(", "))
    }
}

pub type MigrationFn = fn(&rusqlite::Transaction) -> Result<()>;

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<MigrationFn>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            conn.execute(&table.create_sql(), [])?;
            for index in table.indices {
                conn.execute(index, [])?;
            }
        }
        conn.pragma_update(
            None,
            "user_version",
            BASE_DB_VERSION + self.version as i32,
        )?;
        Ok(())
    }
}

/// Create the schema on an empty database, or walk pending migrations on an
/// existing one. `label` only feeds log messages.
pub fn migrate_if_needed(
    conn: &mut Connection,
    schemas: &[VersionedSchema],
    label: &str,
) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = schemas.len() - 1;
    let latest_schema = &schemas[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating {} db schema at version {}", label, latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let mut current_version = if db_version < BASE_DB_VERSION as i64 {
        0
    } else {
        (db_version - BASE_DB_VERSION as i64) as usize
    };

    if current_version >= latest_version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in schemas.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating {} db from version {} to {}",
                label, current_version, schema.version
            );
            migration_fn(&tx)?;
            current_version = schema.version;
        }
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version as i32)?;
    tx.commit()?;
    Ok(())
}

// Row conversion helpers for the stores. rusqlite row closures must return
// rusqlite errors, so domain conversions are funneled through these.

pub fn column_error(
    index: usize,
    message: String,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

pub fn parse_uuid(index: usize, value: String) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(&value)
        .map_err(|e| column_error(index, format!("invalid uuid '{}': {}", value, e)))
}

pub fn parse_datetime(
    index: usize,
    value: String,
) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| column_error(index, format!("invalid timestamp '{}': {}", value, e)))
}

pub fn parse_opt_datetime(
    index: usize,
    value: Option<String>,
) -> rusqlite::Result<Option<chrono::DateTime<chrono::Utc>>> {
    value.map(|v| parse_datetime(index, v)).transpose()
}
