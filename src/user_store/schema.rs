//! SQLite schema definitions for the user database.

use crate::sqlite_column;
use crate::sqlite_persistence::{Column, SqlType, Table, VersionedSchema};

const USERS_TABLE: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("encrypted_sega_id", &SqlType::Text, non_null = true),
        sqlite_column!("encrypted_password", &SqlType::Text, non_null = true),
        sqlite_column!("profile_image_url", &SqlType::Text),
        sqlite_column!("last_played_at", &SqlType::Text),
        sqlite_column!("last_scraped_at", &SqlType::Text),
        sqlite_column!("created_at", &SqlType::Text, non_null = true),
    ],
    indices: &[],
    unique_constraints: &[&["name"]],
};

const USER_DATA_SNAPSHOTS_TABLE: Table = Table {
    name: "user_data_snapshots",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("rating", &SqlType::Integer, non_null = true),
        sqlite_column!("season_play_count", &SqlType::Integer, non_null = true),
        sqlite_column!("total_play_count", &SqlType::Integer, non_null = true),
        sqlite_column!("captured_at", &SqlType::Text, non_null = true),
    ],
    indices: &["CREATE INDEX snapshots_user_index ON user_data_snapshots (user_id);"],
    unique_constraints: &[],
};

const SCORES_TABLE: Table = Table {
    name: "scores",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("user_id", &SqlType::Text, non_null = true),
        sqlite_column!("song_id", &SqlType::Text, non_null = true),
        sqlite_column!("beatmap_id", &SqlType::Text, non_null = true),
        sqlite_column!("accuracy", &SqlType::Text, non_null = true),
        sqlite_column!("max_combo", &SqlType::Integer, non_null = true),
        sqlite_column!("dx_score", &SqlType::Integer, non_null = true),
        sqlite_column!("tap_critical", &SqlType::Integer, non_null = true),
        sqlite_column!("tap_perfect", &SqlType::Integer, non_null = true),
        sqlite_column!("tap_great", &SqlType::Integer, non_null = true),
        sqlite_column!("tap_good", &SqlType::Integer, non_null = true),
        sqlite_column!("tap_miss", &SqlType::Integer, non_null = true),
        sqlite_column!("hold_critical", &SqlType::Integer, non_null = true),
        sqlite_column!("hold_perfect", &SqlType::Integer, non_null = true),
        sqlite_column!("hold_great", &SqlType::Integer, non_null = true),
        sqlite_column!("hold_good", &SqlType::Integer, non_null = true),
        sqlite_column!("hold_miss", &SqlType::Integer, non_null = true),
        sqlite_column!("slide_critical", &SqlType::Integer, non_null = true),
        sqlite_column!("slide_perfect", &SqlType::Integer, non_null = true),
        sqlite_column!("slide_great", &SqlType::Integer, non_null = true),
        sqlite_column!("slide_good", &SqlType::Integer, non_null = true),
        sqlite_column!("slide_miss", &SqlType::Integer, non_null = true),
        sqlite_column!("touch_critical", &SqlType::Integer, non_null = true),
        sqlite_column!("touch_perfect", &SqlType::Integer, non_null = true),
        sqlite_column!("touch_great", &SqlType::Integer, non_null = true),
        sqlite_column!("touch_good", &SqlType::Integer, non_null = true),
        sqlite_column!("touch_miss", &SqlType::Integer, non_null = true),
        sqlite_column!("break_critical", &SqlType::Integer, non_null = true),
        sqlite_column!("break_perfect", &SqlType::Integer, non_null = true),
        sqlite_column!("break_great", &SqlType::Integer, non_null = true),
        sqlite_column!("break_good", &SqlType::Integer, non_null = true),
        sqlite_column!("break_miss", &SqlType::Integer, non_null = true),
        sqlite_column!("fast", &SqlType::Integer, non_null = true),
        sqlite_column!("late", &SqlType::Integer, non_null = true),
        sqlite_column!("played_at", &SqlType::Text, non_null = true),
    ],
    indices: &[
        "CREATE INDEX scores_user_index ON scores (user_id);",
        "CREATE INDEX scores_user_played_index ON scores (user_id, played_at);",
    ],
    unique_constraints: &[&["user_id", "beatmap_id", "played_at"]],
};

pub const USER_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[USERS_TABLE, USER_DATA_SNAPSHOTS_TABLE, SCORES_TABLE],
    migration: None,
}];
