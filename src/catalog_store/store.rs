//! SQLite-backed catalog store implementation.

use super::models::{Beatmap, BeatmapKind, Difficulty, NoteCounts, Song};
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use super::trait_def::CatalogStore;
use crate::sqlite_persistence::{
    column_error, migrate_if_needed, parse_datetime, parse_opt_datetime, parse_uuid,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;
use uuid::Uuid;

/// SQLite-backed catalog store.
#[derive(Clone)]
pub struct SqliteCatalogStore {
    read_conn: Arc<Mutex<Connection>>,
    write_conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Create a new SqliteCatalogStore.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database")?;

        migrate_if_needed(&mut write_conn, CATALOG_VERSIONED_SCHEMAS, "catalog")?;

        write_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on catalog write connection")?;

        let read_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open catalog database for reading")?;

        read_conn
            .pragma_update(None, "journal_mode", "WAL")
            .context("Failed to set WAL mode on catalog read connection")?;

        let song_count: i64 =
            read_conn.query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))?;
        let beatmap_count: i64 =
            read_conn.query_row("SELECT COUNT(*) FROM beatmaps", [], |r| r.get(0))?;
        info!(
            "Catalog store ready: {} songs, {} beatmaps",
            song_count, beatmap_count
        );

        Ok(Self {
            read_conn: Arc::new(Mutex::new(read_conn)),
            write_conn: Arc::new(Mutex::new(write_conn)),
        })
    }
}

const SONG_COLUMNS: &str = "id, alt_key, title, artist, genre, bpm, image, version, \
     is_utage, is_available, is_new, release_date, delete_date";

fn song_from_row(row: &Row) -> rusqlite::Result<Song> {
    Ok(Song {
        id: parse_uuid(0, row.get(0)?)?,
        alt_key: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        genre: row.get(4)?,
        bpm: row.get(5)?,
        image: row.get(6)?,
        version: row.get(7)?,
        is_utage: row.get::<_, i64>(8)? != 0,
        is_available: row.get::<_, i64>(9)? != 0,
        is_new: row.get::<_, i64>(10)? != 0,
        release_date: parse_datetime(11, row.get(11)?)?,
        delete_date: parse_opt_datetime(12, row.get(12)?)?,
    })
}

const BEATMAP_COLUMNS: &str = "id, song_id, difficulty, kind, level, internal_level, \
     tap_notes, hold_notes, slide_notes, touch_notes, break_notes, \
     total_notes, max_dx_score, note_designer, is_valid";

fn beatmap_from_row(row: &Row) -> rusqlite::Result<Beatmap> {
    let difficulty: String = row.get(2)?;
    let difficulty = Difficulty::parse(&difficulty)
        .ok_or_else(|| column_error(2, format!("unknown difficulty '{}'", difficulty)))?;
    let kind: String = row.get(3)?;
    let kind = BeatmapKind::parse(&kind)
        .ok_or_else(|| column_error(3, format!("unknown beatmap kind '{}'", kind)))?;
    Ok(Beatmap {
        id: parse_uuid(0, row.get(0)?)?,
        song_id: parse_uuid(1, row.get(1)?)?,
        difficulty,
        kind,
        level: row.get(4)?,
        internal_level: row.get(5)?,
        notes: NoteCounts {
            tap: row.get(6)?,
            hold: row.get(7)?,
            slide: row.get(8)?,
            touch: row.get(9)?,
            break_: row.get(10)?,
        },
        total_notes: row.get(11)?,
        max_dx_score: row.get(12)?,
        note_designer: row.get(13)?,
        is_valid: row.get::<_, i64>(14)? != 0,
    })
}

fn datetime_to_sql(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

impl CatalogStore for SqliteCatalogStore {
    fn get_song(&self, id: &Uuid) -> Result<Option<Song>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM songs WHERE id = ?1",
            SONG_COLUMNS
        ))?;
        let result = stmt
            .query_row(params![id.to_string()], song_from_row)
            .optional()?;
        Ok(result)
    }

    fn get_song_by_alt_key(&self, alt_key: &str) -> Result<Option<Song>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM songs WHERE alt_key = ?1",
            SONG_COLUMNS
        ))?;
        let result = stmt.query_row(params![alt_key], song_from_row).optional()?;
        Ok(result)
    }

    fn get_song_by_title_and_artist(&self, title: &str, artist: &str) -> Result<Option<Song>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM songs WHERE title = ?1 AND artist = ?2",
            SONG_COLUMNS
        ))?;
        let result = stmt
            .query_row(params![title, artist], song_from_row)
            .optional()?;
        Ok(result)
    }

    fn get_songs_by_title(&self, title: &str) -> Result<Vec<Song>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM songs WHERE title = ?1",
            SONG_COLUMNS
        ))?;
        let songs = stmt
            .query_map(params![title], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    fn get_all_songs(&self) -> Result<Vec<Song>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!("SELECT {} FROM songs", SONG_COLUMNS))?;
        let songs = stmt
            .query_map([], song_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    fn create_song(&self, song: &Song) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO songs
             (id, alt_key, title, artist, genre, bpm, image, version,
              is_utage, is_available, is_new, release_date, delete_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                song.id.to_string(),
                song.alt_key,
                song.title,
                song.artist,
                song.genre,
                song.bpm,
                song.image,
                song.version,
                song.is_utage as i64,
                song.is_available as i64,
                song.is_new as i64,
                datetime_to_sql(&song.release_date),
                song.delete_date.as_ref().map(datetime_to_sql),
            ],
        )?;
        Ok(())
    }

    fn update_song(&self, song: &Song) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE songs SET
             alt_key = ?2, title = ?3, artist = ?4, genre = ?5, bpm = ?6,
             image = ?7, version = ?8, is_utage = ?9, is_available = ?10,
             is_new = ?11, release_date = ?12, delete_date = ?13
             WHERE id = ?1",
            params![
                song.id.to_string(),
                song.alt_key,
                song.title,
                song.artist,
                song.genre,
                song.bpm,
                song.image,
                song.version,
                song.is_utage as i64,
                song.is_available as i64,
                song.is_new as i64,
                datetime_to_sql(&song.release_date),
                song.delete_date.as_ref().map(datetime_to_sql),
            ],
        )?;
        Ok(())
    }

    fn get_beatmap(
        &self,
        song_id: &Uuid,
        difficulty: Difficulty,
        kind: BeatmapKind,
    ) -> Result<Option<Beatmap>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM beatmaps WHERE song_id = ?1 AND difficulty = ?2 AND kind = ?3",
            BEATMAP_COLUMNS
        ))?;
        let result = stmt
            .query_row(
                params![song_id.to_string(), difficulty.as_str(), kind.as_str()],
                beatmap_from_row,
            )
            .optional()?;
        Ok(result)
    }

    fn get_beatmap_by_id(&self, id: &Uuid) -> Result<Option<Beatmap>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM beatmaps WHERE id = ?1",
            BEATMAP_COLUMNS
        ))?;
        let result = stmt
            .query_row(params![id.to_string()], beatmap_from_row)
            .optional()?;
        Ok(result)
    }

    fn get_beatmaps_for_song(&self, song_id: &Uuid) -> Result<Vec<Beatmap>> {
        let conn = self.read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM beatmaps WHERE song_id = ?1",
            BEATMAP_COLUMNS
        ))?;
        let beatmaps = stmt
            .query_map(params![song_id.to_string()], beatmap_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(beatmaps)
    }

    fn create_beatmap(&self, beatmap: &Beatmap) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "INSERT INTO beatmaps
             (id, song_id, difficulty, kind, level, internal_level,
              tap_notes, hold_notes, slide_notes, touch_notes, break_notes,
              total_notes, max_dx_score, note_designer, is_valid)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                beatmap.id.to_string(),
                beatmap.song_id.to_string(),
                beatmap.difficulty.as_str(),
                beatmap.kind.as_str(),
                beatmap.level,
                beatmap.internal_level,
                beatmap.notes.tap,
                beatmap.notes.hold,
                beatmap.notes.slide,
                beatmap.notes.touch,
                beatmap.notes.break_,
                beatmap.total_notes,
                beatmap.max_dx_score,
                beatmap.note_designer,
                beatmap.is_valid as i64,
            ],
        )?;
        Ok(())
    }

    fn update_beatmap(&self, beatmap: &Beatmap) -> Result<()> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute(
            "UPDATE beatmaps SET
             level = ?2, internal_level = ?3, tap_notes = ?4, hold_notes = ?5,
             slide_notes = ?6, touch_notes = ?7, break_notes = ?8,
             total_notes = ?9, max_dx_score = ?10, note_designer = ?11,
             is_valid = ?12
             WHERE id = ?1",
            params![
                beatmap.id.to_string(),
                beatmap.level,
                beatmap.internal_level,
                beatmap.notes.tap,
                beatmap.notes.hold,
                beatmap.notes.slide,
                beatmap.notes.touch,
                beatmap.notes.break_,
                beatmap.total_notes,
                beatmap.max_dx_score,
                beatmap.note_designer,
                beatmap.is_valid as i64,
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

    fn create_test_store() -> (SqliteCatalogStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("catalog.db");
        let store = SqliteCatalogStore::new(&db_path).unwrap();
        (store, tmp)
    }

    fn make_song(title: &str, artist: &str) -> Song {
        Song {
            id: Uuid::new_v4(),
            alt_key: format!("{}{}", title.to_lowercase(), artist.to_lowercase()),
            title: title.to_string(),
            artist: artist.to_string(),
            genre: "POPS＆アニメ".to_string(),
            bpm: "190".to_string(),
            image: "abc123.png".to_string(),
            version: "BUDDiES".to_string(),
            is_utage: false,
            is_available: true,
            is_new: false,
            release_date: Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
            delete_date: None,
        }
    }

    fn make_beatmap(song_id: Uuid, difficulty: Difficulty, kind: BeatmapKind) -> Beatmap {
        Beatmap {
            id: Uuid::new_v4(),
            song_id,
            difficulty,
            kind,
            level: "13+".to_string(),
            internal_level: Some(13.7),
            notes: NoteCounts {
                tap: 400,
                hold: 50,
                slide: 60,
                touch: 10,
                break_: 12,
            },
            total_notes: 532,
            max_dx_score: 1596,
            note_designer: Some("某S氏".to_string()),
            is_valid: true,
        }
    }

    #[test]
    fn test_song_crud() {
        let (store, _tmp) = create_test_store();
        let song = make_song("Oshama Scramble!", "t+pazolite");

        store.create_song(&song).unwrap();

        let result = store.get_song(&song.id).unwrap().unwrap();
        assert_eq!(result, song);

        let by_pair = store
            .get_song_by_title_and_artist("Oshama Scramble!", "t+pazolite")
            .unwrap()
            .unwrap();
        assert_eq!(by_pair.id, song.id);

        let by_key = store.get_song_by_alt_key(&song.alt_key).unwrap().unwrap();
        assert_eq!(by_key.id, song.id);

        assert!(store.get_song(&Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_update_song_preserves_delete_date_round_trip() {
        let (store, _tmp) = create_test_store();
        let mut song = make_song("Valsqotch", "かねこちはる");
        store.create_song(&song).unwrap();

        song.delete_date = Some(Utc.with_ymd_and_hms(2025, 3, 1, 15, 0, 0).unwrap());
        song.is_available = false;
        song.bpm = "236".to_string();
        store.update_song(&song).unwrap();

        let result = store.get_song(&song.id).unwrap().unwrap();
        assert_eq!(result.delete_date, song.delete_date);
        assert!(!result.is_available);
        assert_eq!(result.bpm, "236");
    }

    #[test]
    fn test_songs_sharing_title() {
        let (store, _tmp) = create_test_store();
        let a = make_song("Link", "Circle of friends");
        let b = make_song("Link", "niki");
        store.create_song(&a).unwrap();
        store.create_song(&b).unwrap();

        let songs = store.get_songs_by_title("Link").unwrap();
        assert_eq!(songs.len(), 2);
    }

    #[test]
    fn test_beatmap_crud() {
        let (store, _tmp) = create_test_store();
        let song = make_song("Garakuta Doll Play", "t+pazolite");
        store.create_song(&song).unwrap();

        let beatmap = make_beatmap(song.id, Difficulty::Master, BeatmapKind::Dx);
        store.create_beatmap(&beatmap).unwrap();

        let result = store
            .get_beatmap(&song.id, Difficulty::Master, BeatmapKind::Dx)
            .unwrap()
            .unwrap();
        assert_eq!(result, beatmap);

        assert!(store
            .get_beatmap(&song.id, Difficulty::Expert, BeatmapKind::Dx)
            .unwrap()
            .is_none());

        let by_id = store.get_beatmap_by_id(&beatmap.id).unwrap().unwrap();
        assert_eq!(by_id.notes.break_, 12);
    }

    #[test]
    fn test_update_beatmap_backfills_notes() {
        let (store, _tmp) = create_test_store();
        let song = make_song("oboro", "猫大樹");
        store.create_song(&song).unwrap();

        let mut beatmap = make_beatmap(song.id, Difficulty::Expert, BeatmapKind::Std);
        beatmap.notes = NoteCounts::default();
        beatmap.total_notes = 0;
        beatmap.max_dx_score = 0;
        beatmap.internal_level = None;
        store.create_beatmap(&beatmap).unwrap();

        let stored = store.get_beatmap_by_id(&beatmap.id).unwrap().unwrap();
        assert!(stored.needs_note_backfill());

        beatmap.notes = NoteCounts {
            tap: 300,
            hold: 40,
            slide: 20,
            touch: 0,
            break_: 10,
        };
        beatmap.total_notes = beatmap.notes.total();
        beatmap.max_dx_score = beatmap.total_notes * 3;
        store.update_beatmap(&beatmap).unwrap();

        let stored = store.get_beatmap_by_id(&beatmap.id).unwrap().unwrap();
        assert_eq!(stored.total_notes, 370);
        assert_eq!(stored.max_dx_score, 1110);
        assert!(!stored.needs_note_backfill());
    }

    #[test]
    fn test_duplicate_beatmap_identity_rejected() {
        let (store, _tmp) = create_test_store();
        let song = make_song("QZKago Requiem", "t+pazolite");
        store.create_song(&song).unwrap();

        let a = make_beatmap(song.id, Difficulty::Master, BeatmapKind::Dx);
        let b = make_beatmap(song.id, Difficulty::Master, BeatmapKind::Dx);
        store.create_beatmap(&a).unwrap();
        assert!(store.create_beatmap(&b).is_err());
    }
}
