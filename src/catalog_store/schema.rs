//! SQLite schema definitions for the catalog database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const SONGS_TABLE: Table = Table {
    name: "songs",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("alt_key", &SqlType::Text, non_null = true),
        sqlite_column!("title", &SqlType::Text, non_null = true),
        sqlite_column!("artist", &SqlType::Text, non_null = true),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
        sqlite_column!("bpm", &SqlType::Text, non_null = true),
        sqlite_column!("image", &SqlType::Text, non_null = true),
        sqlite_column!("version", &SqlType::Text, non_null = true),
        sqlite_column!("is_utage", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("is_available", &SqlType::Integer, non_null = true, default_value = Some("1")),
        sqlite_column!("is_new", &SqlType::Integer, non_null = true, default_value = Some("0")),
        // RFC 3339 timestamps
        sqlite_column!("release_date", &SqlType::Text, non_null = true),
        sqlite_column!("delete_date", &SqlType::Text),
    ],
    indices: &[
        "CREATE INDEX songs_alt_key_index ON songs (alt_key);",
        "CREATE INDEX songs_title_index ON songs (title);",
    ],
    unique_constraints: &[],
};

const BEATMAPS_TABLE: Table = Table {
    name: "beatmaps",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!("difficulty", &SqlType::Text, non_null = true),
        sqlite_column!("kind", &SqlType::Text, non_null = true),
        sqlite_column!("level", &SqlType::Text, non_null = true),
        sqlite_column!("internal_level", &SqlType::Real),
        sqlite_column!("tap_notes", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("hold_notes", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("slide_notes", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("touch_notes", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("break_notes", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("total_notes", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("max_dx_score", &SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("note_designer", &SqlType::Text),
        sqlite_column!("is_valid", &SqlType::Integer, non_null = true, default_value = Some("1")),
    ],
    indices: &["CREATE INDEX beatmaps_song_index ON beatmaps (song_id);"],
    unique_constraints: &[&["song_id", "difficulty", "kind"]],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[SONGS_TABLE, BEATMAPS_TABLE],
    migration: None,
}];
