//! SQLite-backed user store implementation.

use super::models::{JudgementCounts, JudgementGrid, Score, User, UserDataSnapshot};
use super::schema::USER_VERSIONED_SCHEMAS;
use super::trait_def::UserStore;
use crate::sqlite_persistence::{
    migrate_if_needed, parse_datetime, parse_opt_datetime, parse_uuid,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// SQLite-backed user store.
#[derive(Clone)]
pub struct SqliteUserStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    /// Create a new SqliteUserStore.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open user database")?;

        migrate_if_needed(&mut write_conn, USER_VERSIONED_SCHEMAS, "user")?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on user write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open user database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on user read connection")?;

        let user_count: i64 =
            read_conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
        let score_count: i64 =
            read_conn.query_row("SELECT COUNT(*) FROM scores", [], |r| r.get(0))?;
        info!(
            "User store ready: {} users, {} scores",
            user_count, score_count
        );

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

const USER_COLUMNS: &str = "id, name, encrypted_sega_id, encrypted_password, \
     profile_image_url, last_played_at, last_scraped_at, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(0, row.get(0)?)?,
        name: row.get(1)?,
        encrypted_sega_id: row.get(2)?,
        encrypted_password: row.get(3)?,
        profile_image_url: row.get(4)?,
        last_played_at: parse_opt_datetime(5, row.get(5)?)?,
        last_scraped_at: parse_opt_datetime(6, row.get(6)?)?,
        created_at: parse_datetime(7, row.get(7)?)?,
    })
}

const SCORE_COLUMNS: &str = "id, user_id, song_id, beatmap_id, accuracy, max_combo, dx_score, \
     tap_critical, tap_perfect, tap_great, tap_good, tap_miss, \
     hold_critical, hold_perfect, hold_great, hold_good, hold_miss, \
     slide_critical, slide_perfect, slide_great, slide_good, slide_miss, \
     touch_critical, touch_perfect, touch_great, touch_good, touch_miss, \
     break_critical, break_perfect, break_great, break_good, break_miss, \
     fast, late, played_at";

fn judgements_from_row(row: &Row, offset: usize) -> rusqlite::Result<JudgementCounts> {
    Ok(JudgementCounts {
        critical: row.get(offset)?,
        perfect: row.get(offset + 1)?,
        great: row.get(offset + 2)?,
        good: row.get(offset + 3)?,
        miss: row.get(offset + 4)?,
    })
}

fn score_from_row(row: &Row) -> rusqlite::Result<Score> {
    Ok(Score {
        id: parse_uuid(0, row.get(0)?)?,
        user_id: parse_uuid(1, row.get(1)?)?,
        song_id: parse_uuid(2, row.get(2)?)?,
        beatmap_id: parse_uuid(3, row.get(3)?)?,
        accuracy: row.get(4)?,
        max_combo: row.get(5)?,
        dx_score: row.get(6)?,
        judgements: JudgementGrid {
            tap: judgements_from_row(row, 7)?,
            hold: judgements_from_row(row, 12)?,
            slide: judgements_from_row(row, 17)?,
            touch: judgements_from_row(row, 22)?,
            break_: judgements_from_row(row, 27)?,
        },
        fast: row.get(32)?,
        late: row.get(33)?,
        played_at: parse_datetime(34, row.get(34)?)?,
    })
}

impl UserStore for SqliteUserStore {
    fn get_user(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM users WHERE id = ?1",
            USER_COLUMNS
        ))?;
        let result = stmt
            .query_row(params![id.to_string()], user_from_row)
            .optional()?;
        Ok(result)
    }

    fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM users WHERE name = ?1",
            USER_COLUMNS
        ))?;
        let result = stmt.query_row(params![name], user_from_row).optional()?;
        Ok(result)
    }

    fn get_all_users(&self) -> Result<Vec<User>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users
             (id, name, encrypted_sega_id, encrypted_password, profile_image_url,
              last_played_at, last_scraped_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user.id.to_string(),
                user.name,
                user.encrypted_sega_id,
                user.encrypted_password,
                user.profile_image_url,
                user.last_played_at.map(|d| d.to_rfc3339()),
                user.last_scraped_at.map(|d| d.to_rfc3339()),
                user.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_user_credentials(&self, user: &User) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET encrypted_sega_id = ?2, encrypted_password = ?3 WHERE id = ?1",
            params![
                user.id.to_string(),
                user.encrypted_sega_id,
                user.encrypted_password,
            ],
        )?;
        Ok(())
    }

    fn update_profile_image_url(&self, user_id: &Uuid, url: &str) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET profile_image_url = ?2 WHERE id = ?1",
            params![user_id.to_string(), url],
        )?;
        Ok(())
    }

    fn update_last_played_at(&self, user_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET last_played_at = ?2 WHERE id = ?1",
            params![user_id.to_string(), at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn update_last_scraped_at(&self, user_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET last_scraped_at = ?2 WHERE id = ?1",
            params![user_id.to_string(), at.to_rfc3339()],
        )?;
        Ok(())
    }

    fn create_user_data_snapshot(&self, snapshot: &UserDataSnapshot) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO user_data_snapshots
             (id, user_id, rating, season_play_count, total_play_count, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.id.to_string(),
                snapshot.user_id.to_string(),
                snapshot.rating,
                snapshot.season_play_count,
                snapshot.total_play_count,
                snapshot.captured_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_snapshots_for_user(&self, user_id: &Uuid) -> Result<Vec<UserDataSnapshot>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, rating, season_play_count, total_play_count, captured_at
             FROM user_data_snapshots WHERE user_id = ?1 ORDER BY captured_at",
        )?;
        let snapshots = stmt
            .query_map(params![user_id.to_string()], |row| {
                Ok(UserDataSnapshot {
                    id: parse_uuid(0, row.get(0)?)?,
                    user_id: parse_uuid(1, row.get(1)?)?,
                    rating: row.get(2)?,
                    season_play_count: row.get(3)?,
                    total_play_count: row.get(4)?,
                    captured_at: parse_datetime(5, row.get(5)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(snapshots)
    }

    fn create_score(&self, score: &Score) -> Result<bool> {
        let conn = self.write_conn.lock().unwrap();
        let j = &score.judgements;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO scores
             (id, user_id, song_id, beatmap_id, accuracy, max_combo, dx_score,
              tap_critical, tap_perfect, tap_great, tap_good, tap_miss,
              hold_critical, hold_perfect, hold_great, hold_good, hold_miss,
              slide_critical, slide_perfect, slide_great, slide_good, slide_miss,
              touch_critical, touch_perfect, touch_great, touch_good, touch_miss,
              break_critical, break_perfect, break_great, break_good, break_miss,
              fast, late, played_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7,
                     ?8, ?9, ?10, ?11, ?12,
                     ?13, ?14, ?15, ?16, ?17,
                     ?18, ?19, ?20, ?21, ?22,
                     ?23, ?24, ?25, ?26, ?27,
                     ?28, ?29, ?30, ?31, ?32,
                     ?33, ?34, ?35)",
            params![
                score.id.to_string(),
                score.user_id.to_string(),
                score.song_id.to_string(),
                score.beatmap_id.to_string(),
                score.accuracy,
                score.max_combo,
                score.dx_score,
                j.tap.critical,
                j.tap.perfect,
                j.tap.great,
                j.tap.good,
                j.tap.miss,
                j.hold.critical,
                j.hold.perfect,
                j.hold.great,
                j.hold.good,
                j.hold.miss,
                j.slide.critical,
                j.slide.perfect,
                j.slide.great,
                j.slide.good,
                j.slide.miss,
                j.touch.critical,
                j.touch.perfect,
                j.touch.great,
                j.touch.good,
                j.touch.miss,
                j.break_.critical,
                j.break_.perfect,
                j.break_.great,
                j.break_.good,
                j.break_.miss,
                score.fast,
                score.late,
                score.played_at.to_rfc3339(),
            ],
        )?;
        Ok(inserted > 0)
    }

    fn get_scores_for_user(&self, user_id: &Uuid) -> Result<Vec<Score>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM scores WHERE user_id = ?1 ORDER BY played_at",
            SCORE_COLUMNS
        ))?;
        let scores = stmt
            .query_map(params![user_id.to_string()], score_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(scores)
    }
}
