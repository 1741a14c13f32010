//! Secondary catalog source: a community wiki with per-song pages.
//!
//! The wiki fills in what the official catalog lacks: BPM text, release and
//! delete dates, internal levels and full note counts. Songs are matched by
//! alt key; the official path owns song creation, so unmatched pages are
//! skipped.

use super::error::ScrapeError;
use super::normalize;
use super::session::{fetch_with_retry, RetryPolicy};
use crate::catalog_store::{Beatmap, BeatmapKind, CatalogStore, Difficulty, NoteCounts};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

lazy_static! {
    static ref NOTE_MARKER: Regex = Regex::new(r"\*[0-9]+").unwrap();
    static ref LEADING_DATE: Regex = Regex::new(r"^[/0-9]+").unwrap();
    static ref BACKGROUND_COLOR: Regex = Regex::new(r"background-color:(#[0-9a-f]+)").unwrap();
}

/// Strip wiki footnote markers (`*1`, `*2`, ...) from a cell. `DECO*27` is a
/// real artist name, not a footnote.
pub fn remove_note_marker(value: &str) -> String {
    if value.contains("*27") {
        return value.to_string();
    }
    NOTE_MARKER.replace_all(value, "").into_owned()
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::parse(format!("bad selector '{}': {}", css, e)))
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Song metadata lifted from the "basic data" table of a wiki page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WikiSongData {
    pub title: String,
    pub artist: String,
    pub genre: String,
    pub bpm: String,
    pub version: String,
    pub release_date: Option<DateTime<Utc>>,
    pub delete_date: Option<DateTime<Utc>>,
}

impl WikiSongData {
    pub fn alt_key(&self) -> String {
        normalize::alt_key(&self.title, &self.artist)
    }
}

/// One chart row from a "beatmap data" table.
#[derive(Debug, Clone, PartialEq)]
pub struct WikiBeatmapRow {
    pub difficulty: Difficulty,
    pub kind: BeatmapKind,
    pub level: String,
    pub internal_level: Option<f64>,
    pub notes: NoteCounts,
    pub total_notes: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WikiSongPage {
    pub song: WikiSongData,
    pub beatmaps: Vec<WikiBeatmapRow>,
}

/// Row difficulties are encoded as cell background colors.
fn difficulty_from_style(style: &str) -> Option<Difficulty> {
    let color = BACKGROUND_COLOR.captures(style)?.get(1)?.as_str().to_string();
    match color.as_str() {
        // easy rows exist on old pages but have no portal counterpart
        "#00ced1" => None,
        "#98fb98" => Some(Difficulty::Basic),
        "#ffa500" => Some(Difficulty::Advanced),
        "#fa8080" => Some(Difficulty::Expert),
        "#ee82ee" => Some(Difficulty::Master),
        "#ffceff" => Some(Difficulty::Remaster),
        "#ff5296" => Some(Difficulty::Utage),
        _ => None,
    }
}

fn parse_count(value: &str) -> u32 {
    normalize::digits(value).parse().unwrap_or(0)
}

fn parse_date_cell(value: &str) -> Option<DateTime<Utc>> {
    let cleaned = remove_note_marker(value);
    let cleaned = LEADING_DATE.find(cleaned.trim())?.as_str();
    normalize::parse_jst_date(cleaned).ok()
}

fn parse_song_table(table: ElementRef) -> Result<WikiSongData, ScrapeError> {
    let row_sel = selector("tr")?;
    let header_sel = selector(".mu__table--col2")?;
    let value_sel = selector(".mu__table--col3")?;

    let mut song = WikiSongData::default();
    let mut release_raw = String::new();
    let mut delete_raw = String::new();
    for row in table.select(&row_sel) {
        let header = row.select(&header_sel).next().map(element_text).unwrap_or_default();
        let value = row.select(&value_sel).next().map(element_text).unwrap_or_default();
        match header.as_str() {
            "ジャンル" => song.genre = remove_note_marker(&value),
            "タイトル" => song.title = remove_note_marker(&value),
            "アーティスト" => song.artist = remove_note_marker(&value),
            "BPM" => song.bpm = remove_note_marker(&value),
            "配信日" => release_raw = value,
            "削除日" => delete_raw = value,
            "バージョン" => song.version = remove_note_marker(&value),
            _ => {}
        }
    }

    if song.title.is_empty() {
        return Err(ScrapeError::parse("song table without a title"));
    }
    song.release_date = parse_date_cell(&release_raw);
    song.delete_date = parse_date_cell(&delete_raw);
    Ok(song)
}

fn parse_beatmap_table(table: ElementRef) -> Result<Vec<WikiBeatmapRow>, ScrapeError> {
    let header_text: String = table
        .select(&selector("thead th")?)
        .map(element_text)
        .collect();
    let has_internal_level = header_text.contains("定数");
    // touch column only exists on dx charts
    let kind = if header_text.contains("Touch") {
        BeatmapKind::Dx
    } else {
        BeatmapKind::Std
    };

    let cell_sel = selector("th")?;
    let mut rows = Vec::new();
    for row in table.select(&selector("tbody tr")?) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        let Some(first) = cells.first() else {
            continue;
        };

        let difficulty = match first
            .value()
            .attr("style")
            .and_then(difficulty_from_style)
        {
            // unknown colors and easy rows are skipped
            None => continue,
            Some(Difficulty::Utage) => continue,
            Some(d) => d,
        };

        let mut texts = cells.iter().map(|c| element_text(*c));
        let level = texts.next().unwrap_or_default();
        let internal_level = if has_internal_level {
            texts.next().and_then(|t| t.trim().parse::<f64>().ok())
        } else {
            None
        };
        let total_notes = parse_count(&texts.next().unwrap_or_default());
        let tap = parse_count(&texts.next().unwrap_or_default());
        let hold = parse_count(&texts.next().unwrap_or_default());
        let slide = parse_count(&texts.next().unwrap_or_default());
        let touch = if kind == BeatmapKind::Dx {
            parse_count(&texts.next().unwrap_or_default())
        } else {
            0
        };
        let break_ = parse_count(&texts.next().unwrap_or_default());

        rows.push(WikiBeatmapRow {
            difficulty,
            kind,
            level,
            internal_level,
            notes: NoteCounts {
                tap,
                hold,
                slide,
                touch,
                break_,
            },
            total_notes,
        });
    }
    Ok(rows)
}

/// Parse one song page: a "basic data" table plus zero or more "beatmap
/// data" tables, told apart by the top-left header cell.
pub fn parse_song_page(html: &str) -> Result<WikiSongPage, ScrapeError> {
    let document = Html::parse_document(html);
    let top_left_sel = selector(".mu__table--row1 .mu__table--col1")?;

    let mut song = None;
    let mut beatmaps = Vec::new();
    for (index, table) in document.select(&selector("table")?).enumerate() {
        let top_left = table
            .select(&top_left_sel)
            .next()
            .map(element_text)
            .unwrap_or_default();
        if top_left.is_empty() && index == 0 {
            song = Some(parse_song_table(table)?);
        } else if top_left == "Lv" {
            beatmaps.extend(parse_beatmap_table(table)?);
        }
    }

    let song = song.ok_or_else(|| ScrapeError::parse("page without a song table"))?;
    Ok(WikiSongPage { song, beatmaps })
}

/// Extract per-song page URLs from the wiki's song list page.
pub fn parse_song_list(html: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let item_sel = selector(".markup.mu .mu__list--1")?;
    let link_sel = selector("a")?;

    let mut urls = Vec::new();
    for item in document.select(&item_sel) {
        if let Some(href) = item
            .select(&link_sel)
            .find_map(|a| a.value().attr("href"))
        {
            urls.push(href.to_string());
        }
    }
    Ok(urls)
}

/// Extract song titles from the deleted-songs page.
pub fn parse_deleted_titles(html: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    let cell_sel = selector("td.mu__table--col2")?;
    Ok(document
        .select(&cell_sel)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect())
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct WikiSyncStats {
    pub songs_updated: usize,
    pub songs_skipped: usize,
    pub beatmaps_upserted: usize,
    pub songs_marked_deleted: usize,
}

pub struct WikiScraperSettings {
    pub base_url: String,
    pub song_list_path: String,
    pub deleted_songs_path: String,
    /// Fetched pages are cached here and never refetched.
    pub cache_dir: Option<PathBuf>,
    pub retry: RetryPolicy,
    /// Politeness delay after each network fetch.
    pub page_delay: Duration,
}

/// Crawls the wiki and reconciles what it finds into the catalog store.
pub struct WikiScraper {
    client: reqwest::Client,
    settings: WikiScraperSettings,
    catalog_store: Arc<dyn CatalogStore>,
}

impl WikiScraper {
    pub fn new(
        settings: WikiScraperSettings,
        catalog_store: Arc<dyn CatalogStore>,
        timeout: Duration,
    ) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            settings,
            catalog_store,
        })
    }

    pub async fn sync(&self, cancel: &CancellationToken) -> Result<WikiSyncStats, ScrapeError> {
        let mut stats = WikiSyncStats::default();

        let list_url = format!(
            "{}{}",
            self.settings.base_url, self.settings.song_list_path
        );
        let list_html =
            fetch_with_retry(&self.client, &list_url, self.settings.retry, cancel).await?;
        let urls = parse_song_list(&list_html)?;
        info!("Wiki song list has {} pages", urls.len());

        for url in urls {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            let html = match self.load_page(&url, cancel).await {
                Ok(html) => html,
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(e) => {
                    warn!("Failed to load wiki page {}: {}", url, e);
                    stats.songs_skipped += 1;
                    continue;
                }
            };
            match parse_song_page(&html) {
                Ok(page) => self.reconcile_page(&page, &mut stats),
                Err(e) => {
                    warn!("Failed to parse wiki page {}: {}", url, e);
                    stats.songs_skipped += 1;
                }
            }
        }

        let deleted_url = format!(
            "{}{}",
            self.settings.base_url, self.settings.deleted_songs_path
        );
        let deleted_html =
            fetch_with_retry(&self.client, &deleted_url, self.settings.retry, cancel).await?;
        for title in parse_deleted_titles(&deleted_html)? {
            match self.mark_unavailable(&title) {
                Ok(marked) => stats.songs_marked_deleted += marked,
                Err(e) => warn!("Failed to mark '{}' unavailable: {}", title, e),
            }
        }

        info!(
            "Wiki sync done: {} songs updated, {} beatmaps upserted, {} skipped, {} marked deleted",
            stats.songs_updated, stats.beatmaps_upserted, stats.songs_skipped, stats.songs_marked_deleted
        );
        Ok(stats)
    }

    /// Load a song page from the local cache, or fetch and cache it.
    async fn load_page(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<String, ScrapeError> {
        let cache_path = self.settings.cache_dir.as_ref().map(|dir| {
            let page_id = url
                .trim_start_matches(self.settings.base_url.as_str())
                .trim_matches('/')
                .replace('/', "_");
            dir.join(format!("{}.html", page_id))
        });

        if let Some(path) = &cache_path {
            if let Ok(cached) = std::fs::read_to_string(path) {
                debug!("Using cached wiki page {}", path.display());
                return Ok(cached);
            }
        }

        let html = fetch_with_retry(&self.client, url, self.settings.retry, cancel).await?;
        if let Some(path) = &cache_path {
            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            if let Err(e) = std::fs::write(path, &html) {
                warn!("Failed to cache wiki page {}: {}", path.display(), e);
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            _ = tokio::time::sleep(self.settings.page_delay) => {}
        }
        Ok(html)
    }

    fn reconcile_page(&self, page: &WikiSongPage, stats: &mut WikiSyncStats) {
        let alt_key = page.song.alt_key();
        let stored = match self.catalog_store.get_song_by_alt_key(&alt_key) {
            Ok(Some(song)) => song,
            Ok(None) => {
                // the official path owns creation
                debug!("No stored song for wiki page '{}'", page.song.title);
                stats.songs_skipped += 1;
                return;
            }
            Err(e) => {
                warn!("Song lookup for '{}' failed: {}", page.song.title, e);
                stats.songs_skipped += 1;
                return;
            }
        };

        let mut song = stored.clone();
        song.bpm = page.song.bpm.clone();
        if let Some(release) = page.song.release_date {
            song.release_date = release;
        }
        song.delete_date = page.song.delete_date;
        song.is_available = page.song.delete_date.is_none();
        if let Err(e) = self.catalog_store.update_song(&song) {
            warn!("Failed to update song '{}': {}", song.title, e);
            stats.songs_skipped += 1;
            return;
        }
        stats.songs_updated += 1;

        for row in &page.beatmaps {
            match self.upsert_beatmap(&song.id, row) {
                Ok(()) => stats.beatmaps_upserted += 1,
                Err(e) => warn!(
                    "Failed to upsert {} {} of '{}': {}",
                    row.kind.as_str(),
                    row.difficulty.as_str(),
                    song.title,
                    e
                ),
            }
        }
    }

    fn upsert_beatmap(&self, song_id: &Uuid, row: &WikiBeatmapRow) -> anyhow::Result<()> {
        let existing = self
            .catalog_store
            .get_beatmap(song_id, row.difficulty, row.kind)?;
        let beatmap = Beatmap {
            id: existing.as_ref().map(|b| b.id).unwrap_or_else(Uuid::new_v4),
            song_id: *song_id,
            difficulty: row.difficulty,
            kind: row.kind,
            level: row.level.clone(),
            internal_level: row.internal_level,
            notes: row.notes,
            total_notes: row.total_notes,
            max_dx_score: row.total_notes * 3,
            note_designer: existing.as_ref().and_then(|b| b.note_designer.clone()),
            // a row without measured notes is present but unusable
            is_valid: row.total_notes > 0,
        };
        if existing.is_some() {
            self.catalog_store.update_beatmap(&beatmap)?;
        } else {
            self.catalog_store.create_beatmap(&beatmap)?;
        }
        Ok(())
    }

    fn mark_unavailable(&self, title: &str) -> anyhow::Result<usize> {
        let mut marked = 0;
        for mut song in self.catalog_store.get_songs_by_title(title)? {
            if !song.is_available {
                continue;
            }
            song.is_available = false;
            self.catalog_store.update_song(&song)?;
            marked += 1;
        }
        Ok(marked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{Song, SqliteCatalogStore};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn note_markers_are_stripped_except_deco27() {
        assert_eq!(remove_note_marker("220*1"), "220");
        assert_eq!(remove_note_marker("ゴーストルール*2"), "ゴーストルール");
        assert_eq!(remove_note_marker("DECO*27"), "DECO*27");
    }

    #[test]
    fn color_map_decodes_difficulties() {
        assert_eq!(
            difficulty_from_style("background-color:#ee82ee"),
            Some(Difficulty::Master)
        );
        assert_eq!(
            difficulty_from_style("background-color:#ffceff"),
            Some(Difficulty::Remaster)
        );
        assert_eq!(
            difficulty_from_style("background-color:#98fb98"),
            Some(Difficulty::Basic)
        );
        // easy and unknown colors are both excluded
        assert_eq!(difficulty_from_style("background-color:#00ced1"), None);
        assert_eq!(difficulty_from_style("background-color:#123456"), None);
        assert_eq!(difficulty_from_style("color:red"), None);
    }

    fn song_table() -> &'static str {
        r#"<table>
        <tr class="mu__table--row1"><th class="mu__table--col1"></th></tr>
        <tr><th class="mu__table--col2">ジャンル</th><td class="mu__table--col3">POPS＆アニメ</td></tr>
        <tr><th class="mu__table--col2">タイトル</th><td class="mu__table--col3">シャルル*3</td></tr>
        <tr><th class="mu__table--col2">アーティスト</th><td class="mu__table--col3">バルーン</td></tr>
        <tr><th class="mu__table--col2">BPM</th><td class="mu__table--col3">145</td></tr>
        <tr><th class="mu__table--col2">配信日</th><td class="mu__table--col3">2017/09/22（金）</td></tr>
        <tr><th class="mu__table--col2">バージョン</th><td class="mu__table--col3">MiLK</td></tr>
        </table>"#
    }

    fn dx_beatmap_table() -> &'static str {
        r#"<table>
        <thead>
        <tr class="mu__table--row1"><th class="mu__table--col1">Lv</th><th>定数</th><th>総数</th>
            <th>Tap</th><th>Hold</th><th>Slide</th><th>Touch</th><th>Break</th></tr>
        </thead>
        <tbody>
        <tr><th style="background-color:#ee82ee">13</th><th>13.2</th><th>531</th>
            <th>400</th><th>60</th><th>40</th><th>19</th><th>12</th></tr>
        <tr><th style="background-color:#fa8080">11</th><th></th><th>420</th>
            <th>330</th><th>50</th><th>20</th><th>10</th><th>10</th></tr>
        <tr><th style="background-color:#00ced1">2</th><th></th><th>100</th>
            <th>90</th><th>5</th><th>5</th><th>0</th><th>0</th></tr>
        </tbody>
        </table>"#
    }

    fn std_beatmap_table() -> &'static str {
        r#"<table>
        <thead>
        <tr class="mu__table--row1"><th class="mu__table--col1">Lv</th><th>総数</th>
            <th>Tap</th><th>Hold</th><th>Slide</th><th>Break</th></tr>
        </thead>
        <tbody>
        <tr><th style="background-color:#98fb98">4</th><th>0</th>
            <th>-</th><th>-</th><th>-</th><th>-</th></tr>
        </tbody>
        </table>"#
    }

    fn full_page() -> String {
        format!(
            "<html><body><div class=\"markup mu\">{}{}{}</div></body></html>",
            song_table(),
            dx_beatmap_table(),
            std_beatmap_table()
        )
    }

    #[test]
    fn parses_song_table_with_markers_and_dates() {
        let page = parse_song_page(&full_page()).unwrap();
        assert_eq!(page.song.title, "シャルル");
        assert_eq!(page.song.artist, "バルーン");
        assert_eq!(page.song.bpm, "145");
        assert_eq!(page.song.version, "MiLK");
        // trailing weekday annotation is dropped, date is midnight JST
        assert_eq!(
            page.song.release_date,
            Some(Utc.with_ymd_and_hms(2017, 9, 21, 15, 0, 0).unwrap())
        );
        assert_eq!(page.song.delete_date, None);
    }

    #[test]
    fn touch_header_means_dx_and_its_absence_std() {
        let page = parse_song_page(&full_page()).unwrap();
        let dx: Vec<_> = page
            .beatmaps
            .iter()
            .filter(|b| b.kind == BeatmapKind::Dx)
            .collect();
        let std: Vec<_> = page
            .beatmaps
            .iter()
            .filter(|b| b.kind == BeatmapKind::Std)
            .collect();
        assert_eq!(dx.len(), 2);
        assert_eq!(std.len(), 1);
    }

    #[test]
    fn beatmap_rows_parse_levels_and_notes() {
        let page = parse_song_page(&full_page()).unwrap();
        let master = page
            .beatmaps
            .iter()
            .find(|b| b.difficulty == Difficulty::Master)
            .unwrap();
        assert_eq!(master.level, "13");
        assert_eq!(master.internal_level, Some(13.2));
        assert_eq!(master.total_notes, 531);
        assert_eq!(
            master.notes,
            NoteCounts {
                tap: 400,
                hold: 60,
                slide: 40,
                touch: 19,
                break_: 12
            }
        );

        // empty internal level cell is None, easy row excluded
        let expert = page
            .beatmaps
            .iter()
            .find(|b| b.difficulty == Difficulty::Expert)
            .unwrap();
        assert_eq!(expert.internal_level, None);
        assert_eq!(page.beatmaps.len(), 3);
    }

    #[test]
    fn song_list_and_deleted_pages_parse() {
        let list_html = r#"<div class="markup mu">
            <ul>
            <li class="mu__list--1"><a href="https://wiki.example/maimai/533541">Oshama</a></li>
            <li class="mu__list--1"><a href="https://wiki.example/maimai/533542">Garakuta</a></li>
            <li class="mu__list--1">no link here</li>
            </ul></div>"#;
        assert_eq!(
            parse_song_list(list_html).unwrap(),
            vec![
                "https://wiki.example/maimai/533541".to_string(),
                "https://wiki.example/maimai/533542".to_string(),
            ]
        );

        let deleted_html = r#"<div class="main"><table>
            <tr><td class="mu__table--col1">1</td><td class="mu__table--col2">Bye Song</td></tr>
            </table></div>"#;
        assert_eq!(parse_deleted_titles(deleted_html).unwrap(), vec!["Bye Song"]);
    }

    fn seeded_scraper() -> (WikiScraper, Arc<SqliteCatalogStore>, TempDir, Uuid) {
        let tmp = TempDir::new().unwrap();
        let store = Arc::new(SqliteCatalogStore::new(tmp.path().join("catalog.db")).unwrap());
        let song = Song {
            id: Uuid::new_v4(),
            alt_key: normalize::alt_key("シャルル", "バルーン"),
            title: "シャルル".to_string(),
            artist: "バルーン".to_string(),
            genre: "POPS＆アニメ".to_string(),
            bpm: String::new(),
            image: "c.png".to_string(),
            version: "MiLK".to_string(),
            is_utage: false,
            is_available: true,
            is_new: false,
            release_date: Utc.with_ymd_and_hms(2017, 9, 21, 15, 0, 0).unwrap(),
            delete_date: None,
        };
        store.create_song(&song).unwrap();

        let scraper = WikiScraper::new(
            WikiScraperSettings {
                base_url: "https://wiki.example/maimai".to_string(),
                song_list_path: "/545589".to_string(),
                deleted_songs_path: "/533442".to_string(),
                cache_dir: None,
                retry: RetryPolicy::default(),
                page_delay: Duration::from_millis(0),
            },
            store.clone(),
            Duration::from_secs(5),
        )
        .unwrap();
        (scraper, store, tmp, song.id)
    }

    #[test]
    fn reconcile_updates_song_and_upserts_beatmaps() {
        let (scraper, store, _tmp, song_id) = seeded_scraper();
        let page = parse_song_page(&full_page()).unwrap();

        let mut stats = WikiSyncStats::default();
        scraper.reconcile_page(&page, &mut stats);
        assert_eq!(stats.songs_updated, 1);
        assert_eq!(stats.beatmaps_upserted, 3);

        let song = store.get_song(&song_id).unwrap().unwrap();
        assert_eq!(song.bpm, "145");
        assert!(song.is_available);

        let master = store
            .get_beatmap(&song_id, Difficulty::Master, BeatmapKind::Dx)
            .unwrap()
            .unwrap();
        assert_eq!(master.max_dx_score, 531 * 3);
        assert!(master.is_valid);

        // zero measured notes means present-but-invalid
        let basic = store
            .get_beatmap(&song_id, Difficulty::Basic, BeatmapKind::Std)
            .unwrap()
            .unwrap();
        assert!(!basic.is_valid);
        assert_eq!(basic.total_notes, 0);
    }

    #[test]
    fn reconcile_skips_unknown_songs() {
        let (scraper, _store, _tmp, _) = seeded_scraper();
        let mut page = parse_song_page(&full_page()).unwrap();
        page.song.title = "存在しない曲".to_string();

        let mut stats = WikiSyncStats::default();
        scraper.reconcile_page(&page, &mut stats);
        assert_eq!(stats.songs_updated, 0);
        assert_eq!(stats.songs_skipped, 1);
    }

    #[test]
    fn delete_date_marks_song_unavailable() {
        let (scraper, store, _tmp, song_id) = seeded_scraper();
        let mut page = parse_song_page(&full_page()).unwrap();
        page.song.delete_date = Some(Utc.with_ymd_and_hms(2020, 3, 31, 15, 0, 0).unwrap());

        let mut stats = WikiSyncStats::default();
        scraper.reconcile_page(&page, &mut stats);

        let song = store.get_song(&song_id).unwrap().unwrap();
        assert!(!song.is_available);
        assert_eq!(song.delete_date, page.song.delete_date);
    }

    #[test]
    fn deleted_titles_mark_songs_unavailable() {
        let (scraper, store, _tmp, song_id) = seeded_scraper();
        assert_eq!(scraper.mark_unavailable("シャルル").unwrap(), 1);
        // second pass is a no-op
        assert_eq!(scraper.mark_unavailable("シャルル").unwrap(), 0);
        assert!(!store.get_song(&song_id).unwrap().unwrap().is_available);
    }
}
