//! Official bulk-catalog sync.
//!
//! The publisher exposes the full song list as one JSON document. This is the
//! authoritative path: it creates songs and their level-only beatmap shells.
//! Note counts and internal levels come from the wiki path and score
//! backfill.

use super::error::ScrapeError;
use super::normalize;
use crate::assets::{mirror_song_image, AssetStore};
use crate::catalog_store::{Beatmap, BeatmapKind, CatalogStore, Difficulty, NoteCounts, Song};
use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// One entry of the bulk catalog document. Field names follow the JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    #[serde(default)]
    pub title_kana: String,
    pub artist: String,
    #[serde(rename = "catcode")]
    pub genre: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub lev_bas: String,
    #[serde(default)]
    pub lev_adv: String,
    #[serde(default)]
    pub lev_exp: String,
    #[serde(default)]
    pub lev_mas: String,
    #[serde(default)]
    pub lev_remas: String,
    #[serde(default)]
    pub dx_lev_bas: String,
    #[serde(default)]
    pub dx_lev_adv: String,
    #[serde(default)]
    pub dx_lev_exp: String,
    #[serde(default)]
    pub dx_lev_mas: String,
    #[serde(default)]
    pub dx_lev_remas: String,
    #[serde(default)]
    pub lev_utage: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub release: String,
    pub image_url: String,
}

/// Fetch and decode the bulk catalog document.
pub async fn fetch_catalog(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<CatalogEntry>, ScrapeError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let entries: Vec<CatalogEntry> = response
        .json()
        .await
        .map_err(|e| ScrapeError::parse(format!("bad catalog document: {}", e)))?;
    Ok(entries)
}

/// Corrections for known-bad source data, applied before reconciliation.
pub fn apply_edge_cases(entry: &mut CatalogEntry) {
    // two party charts share this title, the comment tells them apart
    if entry.title == "[協]青春コンプレックス" {
        let suffix = if entry.comment.contains("入門編") {
            "（入門編）"
        } else {
            "（ヒーロー級）"
        };
        entry.title.push_str(suffix);
    }

    // artist field was blanked upstream
    if entry.title == "ぽっぴっぽー" {
        entry.artist = "(ラマーズP)".to_string();
    }

    // placeholder for "launch title"
    if entry.release == "000000" {
        entry.release = "060102".to_string();
    }
}

/// Map the packed version field's 3-digit prefix to a game version label.
pub fn version_label(version: &str) -> &'static str {
    let prefix = version.get(..3).unwrap_or("");
    match prefix {
        "100" => "maimai",
        "110" => "maimai PLUS",
        "120" => "GreeN",
        "130" => "GreeN PLUS",
        "140" => "ORANGE",
        "150" => "ORANGE PLUS",
        "160" => "PiNK",
        "170" => "PiNK PLUS",
        "180" => "MURASAKi",
        "185" => "MURASAKi PLUS",
        "190" => "MiLK",
        "195" => "MiLK PLUS",
        "199" => "FiNALE",
        "200" => "maimaiでらっくす",
        "205" => "maimaiでらっくす PLUS",
        "210" => "Splash",
        "215" => "Splash PLUS",
        "220" => "UNiVERSE",
        "225" => "UNiVERSE PLUS",
        "230" => "FESTiVAL",
        "235" => "FESTiVAL PLUS",
        "240" => "BUDDiES",
        "245" => "BUDDiES PLUS",
        "250" => "PRiSM",
        "255" => "PRiSM PLUS",
        _ => "",
    }
}

const UTAGE_GENRE: &str = "宴会場";

fn difficulty_slots(entry: &CatalogEntry) -> [(&str, Difficulty, BeatmapKind); 11] {
    [
        (entry.lev_bas.as_str(), Difficulty::Basic, BeatmapKind::Std),
        (entry.lev_adv.as_str(), Difficulty::Advanced, BeatmapKind::Std),
        (entry.lev_exp.as_str(), Difficulty::Expert, BeatmapKind::Std),
        (entry.lev_mas.as_str(), Difficulty::Master, BeatmapKind::Std),
        (entry.lev_remas.as_str(), Difficulty::Remaster, BeatmapKind::Std),
        (entry.dx_lev_bas.as_str(), Difficulty::Basic, BeatmapKind::Dx),
        (entry.dx_lev_adv.as_str(), Difficulty::Advanced, BeatmapKind::Dx),
        (entry.dx_lev_exp.as_str(), Difficulty::Expert, BeatmapKind::Dx),
        (entry.dx_lev_mas.as_str(), Difficulty::Master, BeatmapKind::Dx),
        (entry.dx_lev_remas.as_str(), Difficulty::Remaster, BeatmapKind::Dx),
        (entry.lev_utage.as_str(), Difficulty::Utage, BeatmapKind::Utage),
    ]
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CatalogSyncStats {
    pub songs_created: usize,
    pub songs_updated: usize,
    pub beatmaps_created: usize,
    pub entries_skipped: usize,
}

/// Reconciles bulk catalog entries into the catalog store.
pub struct CatalogSyncer {
    catalog_store: Arc<dyn CatalogStore>,
    asset_store: Option<Arc<dyn AssetStore>>,
    /// Base URL cover filenames are appended to when mirroring.
    image_base_url: String,
}

impl CatalogSyncer {
    pub fn new(
        catalog_store: Arc<dyn CatalogStore>,
        asset_store: Option<Arc<dyn AssetStore>>,
        image_base_url: String,
    ) -> Self {
        Self {
            catalog_store,
            asset_store,
            image_base_url,
        }
    }

    /// Upsert every entry. Malformed entries are logged and skipped, the
    /// batch always runs to completion.
    pub fn sync(&self, mut entries: Vec<CatalogEntry>) -> CatalogSyncStats {
        let mut stats = CatalogSyncStats::default();
        for entry in entries.iter_mut() {
            apply_edge_cases(entry);
            match self.upsert_entry(entry, &mut stats) {
                Ok(()) => {}
                Err(e) => {
                    warn!("Skipping catalog entry '{}': {}", entry.title, e);
                    stats.entries_skipped += 1;
                }
            }
        }
        info!(
            "Catalog sync done: {} created, {} updated, {} beatmaps added, {} skipped",
            stats.songs_created, stats.songs_updated, stats.beatmaps_created, stats.entries_skipped
        );
        stats
    }

    fn upsert_entry(&self, entry: &CatalogEntry, stats: &mut CatalogSyncStats) -> Result<()> {
        let release_date = normalize::parse_packed_release(&entry.release)?;

        let existing = self
            .catalog_store
            .get_song_by_title_and_artist(&entry.title, &entry.artist)?;

        let song_id = match existing {
            None => {
                let song = Song {
                    id: Uuid::new_v4(),
                    alt_key: normalize::alt_key(&entry.title, &entry.artist),
                    title: entry.title.clone(),
                    artist: entry.artist.clone(),
                    genre: entry.genre.clone(),
                    bpm: String::new(),
                    image: entry.image_url.clone(),
                    version: version_label(&entry.version).to_string(),
                    is_utage: entry.genre == UTAGE_GENRE,
                    is_available: true,
                    is_new: entry.date == "NEW",
                    release_date,
                    delete_date: None,
                };
                self.catalog_store.create_song(&song)?;
                stats.songs_created += 1;
                self.mirror_image(&entry.image_url);
                song.id
            }
            Some(stored) => {
                let song = Song {
                    alt_key: normalize::alt_key(&entry.title, &entry.artist),
                    title: entry.title.clone(),
                    artist: entry.artist.clone(),
                    genre: entry.genre.clone(),
                    image: entry.image_url.clone(),
                    version: version_label(&entry.version).to_string(),
                    is_utage: entry.genre == UTAGE_GENRE,
                    is_available: true,
                    is_new: entry.date == "NEW",
                    release_date,
                    // bpm and delete_date are owned by the wiki path
                    ..stored.clone()
                };
                self.catalog_store.update_song(&song)?;
                stats.songs_updated += 1;
                stored.id
            }
        };

        for (level, difficulty, kind) in difficulty_slots(entry) {
            if level.is_empty() {
                continue;
            }
            if self
                .catalog_store
                .get_beatmap(&song_id, difficulty, kind)?
                .is_some()
            {
                // note counts and internal levels are owned elsewhere
                continue;
            }
            let beatmap = Beatmap {
                id: Uuid::new_v4(),
                song_id,
                difficulty,
                kind,
                level: level.to_string(),
                internal_level: None,
                notes: NoteCounts::default(),
                total_notes: 0,
                max_dx_score: 0,
                note_designer: None,
                is_valid: true,
            };
            self.catalog_store.create_beatmap(&beatmap)?;
            stats.beatmaps_created += 1;
        }

        Ok(())
    }

    /// Fire-and-forget cover mirroring. Failures are logged inside the task
    /// and never fail the sync.
    fn mirror_image(&self, filename: &str) {
        let Some(asset_store) = self.asset_store.clone() else {
            return;
        };
        let url = format!("{}/{}", self.image_base_url.trim_end_matches('/'), filename);
        let filename = filename.to_string();
        tokio::spawn(async move {
            mirror_song_image(asset_store.as_ref(), &url, &filename).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::SqliteCatalogStore;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn entry(title: &str, artist: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            artist: artist.to_string(),
            genre: "POPS＆アニメ".to_string(),
            lev_bas: "5".to_string(),
            lev_adv: "7".to_string(),
            lev_exp: "10".to_string(),
            lev_mas: "12+".to_string(),
            dx_lev_mas: "13".to_string(),
            version: "240001".to_string(),
            release: "240315".to_string(),
            image_url: "cover123.png".to_string(),
            ..CatalogEntry::default()
        }
    }

    fn test_syncer() -> (CatalogSyncer, Arc<SqliteCatalogStore>, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteCatalogStore::new(tmp.path().join("catalog.db")).unwrap());
        let syncer = CatalogSyncer::new(store.clone(), None, "https://example.com/img".to_string());
        (syncer, store, tmp)
    }

    #[test]
    fn party_chart_title_is_disambiguated_by_comment() {
        let mut beginner = CatalogEntry {
            title: "[協]青春コンプレックス".to_string(),
            comment: "バンドメンバーを集めて楽しもう！（入門編）".to_string(),
            ..CatalogEntry::default()
        };
        apply_edge_cases(&mut beginner);
        assert_eq!(beginner.title, "[協]青春コンプレックス（入門編）");

        let mut hero = CatalogEntry {
            title: "[協]青春コンプレックス".to_string(),
            comment: "みんなで協力してクリアしよう".to_string(),
            ..CatalogEntry::default()
        };
        apply_edge_cases(&mut hero);
        assert_eq!(hero.title, "[協]青春コンプレックス（ヒーロー級）");
    }

    #[test]
    fn censored_artist_is_restored() {
        let mut e = CatalogEntry {
            title: "ぽっぴっぽー".to_string(),
            ..CatalogEntry::default()
        };
        apply_edge_cases(&mut e);
        assert_eq!(e.artist, "(ラマーズP)");
    }

    #[test]
    fn zero_release_becomes_launch_date() {
        let mut e = CatalogEntry {
            release: "000000".to_string(),
            ..CatalogEntry::default()
        };
        apply_edge_cases(&mut e);
        assert_eq!(e.release, "060102");
        let dt = normalize::parse_packed_release(&e.release).unwrap();
        // 2006-01-02 midnight JST
        assert_eq!(dt, Utc.with_ymd_and_hms(2006, 1, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn version_label_prefix_map() {
        assert_eq!(version_label("240001"), "BUDDiES");
        assert_eq!(version_label("255123"), "PRiSM PLUS");
        assert_eq!(version_label("000000"), "");
        assert_eq!(version_label("9"), "");
    }

    #[test]
    fn catalog_document_decodes() {
        let json = r#"[{
            "title": "Song A",
            "title_kana": "ソングエー",
            "artist": "Artist A",
            "catcode": "POPS＆アニメ",
            "lev_bas": "4",
            "lev_adv": "6",
            "lev_exp": "9",
            "lev_mas": "11",
            "version": "230002",
            "date": "NEW",
            "release": "230914",
            "image_url": "a.png",
            "sort": "1"
        }]"#;
        let entries: Vec<CatalogEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].genre, "POPS＆アニメ");
        assert_eq!(entries[0].lev_mas, "11");
        assert!(entries[0].dx_lev_mas.is_empty());
    }

    #[tokio::test]
    async fn sync_creates_then_updates() {
        let (syncer, store, _tmp) = test_syncer();

        let stats = syncer.sync(vec![entry("Song A", "Artist A")]);
        assert_eq!(stats.songs_created, 1);
        assert_eq!(stats.beatmaps_created, 5);

        let song = store
            .get_song_by_title_and_artist("Song A", "Artist A")
            .unwrap()
            .unwrap();
        assert_eq!(song.version, "BUDDiES");
        assert!(song.is_available);
        assert!(store
            .get_beatmap(&song.id, Difficulty::Master, BeatmapKind::Dx)
            .unwrap()
            .is_some());
        assert!(store
            .get_beatmap(&song.id, Difficulty::Remaster, BeatmapKind::Std)
            .unwrap()
            .is_none());

        // second run updates in place, beatmaps untouched
        let mut updated = entry("Song A", "Artist A");
        updated.date = "NEW".to_string();
        let stats = syncer.sync(vec![updated]);
        assert_eq!(stats.songs_created, 0);
        assert_eq!(stats.songs_updated, 1);
        assert_eq!(stats.beatmaps_created, 0);

        let song = store.get_song(&song.id).unwrap().unwrap();
        assert!(song.is_new);
    }

    #[tokio::test]
    async fn sync_preserves_wiki_owned_fields() {
        let (syncer, store, _tmp) = test_syncer();
        syncer.sync(vec![entry("Song A", "Artist A")]);

        let mut song = store
            .get_song_by_title_and_artist("Song A", "Artist A")
            .unwrap()
            .unwrap();
        song.bpm = "190".to_string();
        song.delete_date = Some(Utc.with_ymd_and_hms(2025, 6, 1, 15, 0, 0).unwrap());
        store.update_song(&song).unwrap();

        syncer.sync(vec![entry("Song A", "Artist A")]);
        let song = store.get_song(&song.id).unwrap().unwrap();
        assert_eq!(song.bpm, "190");
        assert!(song.delete_date.is_some());
    }

    #[tokio::test]
    async fn malformed_entry_is_skipped_not_fatal() {
        let (syncer, store, _tmp) = test_syncer();
        let mut bad = entry("Broken", "Artist");
        bad.release = "notdate".to_string();

        let stats = syncer.sync(vec![bad, entry("Good", "Artist")]);
        assert_eq!(stats.entries_skipped, 1);
        assert_eq!(stats.songs_created, 1);
        assert!(store
            .get_song_by_title_and_artist("Good", "Artist")
            .unwrap()
            .is_some());
    }
}
