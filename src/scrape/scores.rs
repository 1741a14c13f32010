//! Play record scraping: the record list page and per-play detail pages.

use super::error::ScrapeError;
use super::normalize;
use crate::catalog_store::{BeatmapKind, CatalogStore, Difficulty};
use crate::user_store::{JudgementCounts, JudgementGrid};
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use uuid::Uuid;

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::parse(format!("bad selector '{}': {}", css, e)))
}

fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Reference to one play on the record list page. The id is the opaque value
/// the portal wants back as the `idx` query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    pub id: String,
    pub played_at: DateTime<Utc>,
}

impl RecordRef {
    pub fn detail_path(&self) -> String {
        format!("/record/playlogDetail/?idx={}", urlencoding::encode(&self.id))
    }
}

/// Parse the record list page into the plays strictly newer than `since`,
/// oldest first. The page itself lists newest first; the reversal keeps
/// persistence in watermark order.
pub fn list_new_records(
    html: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<RecordRef>, ScrapeError> {
    let document = Html::parse_document(html);
    let entry_sel = selector(".p_10.t_l.f_0.v_b")?;
    let time_sel = selector(".v_b")?;
    let hidden_sel = selector(r#"input[type="hidden"]"#)?;

    let mut records = Vec::new();
    for entry in document.select(&entry_sel) {
        let time_text = entry
            .select(&time_sel)
            .next()
            .map(element_text)
            .ok_or_else(|| ScrapeError::parse("record entry without timestamp"))?;
        let played_at = normalize::parse_played_at(&time_text)?;
        if let Some(since) = since {
            if played_at <= since {
                continue;
            }
        }
        let id = entry
            .select(&hidden_sel)
            .find_map(|input| input.value().attr("value"))
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ScrapeError::parse("record entry without detail id"))?;
        records.push(RecordRef {
            id: id.to_string(),
            played_at,
        });
    }

    records.reverse();
    Ok(records)
}

/// Everything a play detail page yields before catalog resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedScore {
    pub title: String,
    /// Cover filename, used to disambiguate songs sharing a title.
    pub image: String,
    pub difficulty: Difficulty,
    pub kind: BeatmapKind,
    pub accuracy: String,
    pub max_combo: u32,
    pub dx_score: u32,
    pub judgements: JudgementGrid,
    pub fast: u32,
    pub late: u32,
    pub played_at: DateTime<Utc>,
}

fn difficulty_from_icon(src: &str) -> Option<Difficulty> {
    let filename = src.rsplit('/').next()?;
    match filename {
        "diff_basic.png" => Some(Difficulty::Basic),
        "diff_advanced.png" => Some(Difficulty::Advanced),
        "diff_expert.png" => Some(Difficulty::Expert),
        "diff_master.png" => Some(Difficulty::Master),
        "diff_remaster.png" => Some(Difficulty::Remaster),
        "diff_utage.png" => Some(Difficulty::Utage),
        _ => None,
    }
}

fn kind_from_icon(src: &str) -> Option<BeatmapKind> {
    let filename = src.rsplit('/').next()?;
    match filename {
        "music_dx.png" => Some(BeatmapKind::Dx),
        "music_standard.png" => Some(BeatmapKind::Std),
        _ => None,
    }
}

fn parse_count_cell(text: &str) -> Result<u32, ScrapeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "　" {
        return Ok(0);
    }
    normalize::parse_digits(trimmed)
}

fn judgements_from_cells(cells: &[String]) -> Result<JudgementCounts, ScrapeError> {
    Ok(JudgementCounts {
        critical: parse_count_cell(&cells[0])?,
        perfect: parse_count_cell(&cells[1])?,
        great: parse_count_cell(&cells[2])?,
        good: parse_count_cell(&cells[3])?,
        miss: parse_count_cell(&cells[4])?,
    })
}

/// Parse one play detail page.
pub fn parse_score_detail(html: &str) -> Result<ParsedScore, ScrapeError> {
    let document = Html::parse_document(html);

    let accuracy = document
        .select(&selector(".playlog_achievement_txt")?)
        .next()
        .map(element_text)
        .ok_or_else(|| ScrapeError::parse("missing achievement"))?;

    // first score block is "combo / max combo", second is sync
    let combo_text = document
        .select(&selector(".playlog_score_block.p_5")?)
        .next()
        .map(element_text)
        .ok_or_else(|| ScrapeError::parse("missing combo block"))?;
    let combo_cleaned: String = combo_text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '/')
        .collect();
    let max_combo = combo_cleaned
        .split('/')
        .next()
        .unwrap_or("")
        .parse()
        .map_err(|_| ScrapeError::parse(format!("bad combo '{}'", combo_text)))?;

    // "dx score / max dx score"
    let dx_text = document
        .select(&selector(".white.p_r_5.f_15.f_r")?)
        .next()
        .map(element_text)
        .ok_or_else(|| ScrapeError::parse("missing dx score"))?;
    let dx_score = normalize::parse_digits(dx_text.split('/').next().unwrap_or(""))?;

    // judgement table, row-major: a 5-cell header row, then one row per note
    // type ordered tap/hold/slide/touch/break. Std charts either render the
    // touch row with empty cells or drop it entirely, so the layout is
    // decided by cell count rather than fixed offsets.
    let cells: Vec<String> = document
        .select(&selector(".playlog_notes_detail td")?)
        .map(element_text)
        .collect();
    let (judgements, touch_row_filled) = match cells.len() {
        30 => {
            let touch_empty = cells[20..25].iter().all(|c| c.trim().is_empty());
            let touch = if touch_empty {
                JudgementCounts::default()
            } else {
                judgements_from_cells(&cells[20..25])?
            };
            (
                JudgementGrid {
                    tap: judgements_from_cells(&cells[5..10])?,
                    hold: judgements_from_cells(&cells[10..15])?,
                    slide: judgements_from_cells(&cells[15..20])?,
                    touch,
                    break_: judgements_from_cells(&cells[25..30])?,
                },
                !touch_empty,
            )
        }
        25 => (
            JudgementGrid {
                tap: judgements_from_cells(&cells[5..10])?,
                hold: judgements_from_cells(&cells[10..15])?,
                slide: judgements_from_cells(&cells[15..20])?,
                touch: JudgementCounts::default(),
                break_: judgements_from_cells(&cells[20..25])?,
            },
            false,
        ),
        n => {
            return Err(ScrapeError::parse(format!(
                "unexpected judgement table size {}",
                n
            )))
        }
    };

    let fl: Vec<u32> = document
        .select(&selector(".playlog_fl_block.m_5.f_r.f_12 .p_t_5")?)
        .map(|e| parse_count_cell(&element_text(e)))
        .collect::<Result<_, _>>()?;
    let (fast, late) = match fl.as_slice() {
        [fast, late, ..] => (*fast, *late),
        _ => return Err(ScrapeError::parse("missing fast/late block")),
    };

    let played_text = document
        .select(&selector(".sub_title.t_c.f_r.f_11 .v_b")?)
        .next()
        .map(element_text)
        .ok_or_else(|| ScrapeError::parse("missing play timestamp"))?;
    let played_at = normalize::parse_played_at(&played_text)?;

    let title = document
        .select(&selector(".basic_block.m_5.p_5.p_l_10.f_13.break")?)
        .next()
        .map(element_text)
        .ok_or_else(|| ScrapeError::parse("missing title"))?;

    let difficulty = document
        .select(&selector("img.playlog_diff")?)
        .find_map(|img| img.value().attr("src"))
        .and_then(difficulty_from_icon)
        .ok_or_else(|| ScrapeError::parse("missing difficulty icon"))?;

    // chart kind: explicit type icon when present, else the touch row
    let kind = if difficulty == Difficulty::Utage {
        BeatmapKind::Utage
    } else {
        document
            .select(&selector("img.playlog_music_kind_icon")?)
            .find_map(|img| img.value().attr("src"))
            .and_then(kind_from_icon)
            .unwrap_or(if touch_row_filled {
                BeatmapKind::Dx
            } else {
                BeatmapKind::Std
            })
    };

    let image = document
        .select(&selector("img.music_img")?)
        .find_map(|img| img.value().attr("src"))
        .and_then(|src| src.rsplit('/').next())
        .map(str::to_string)
        .ok_or_else(|| ScrapeError::parse("missing cover image"))?;

    Ok(ParsedScore {
        title,
        image,
        difficulty,
        kind,
        accuracy,
        max_combo,
        dx_score,
        judgements,
        fast,
        late,
        played_at,
    })
}

/// Match a parsed play to a stored song and beatmap. Songs sharing the title
/// are disambiguated by exact cover filename.
pub fn resolve_score(
    catalog_store: &dyn CatalogStore,
    parsed: &ParsedScore,
) -> Result<(Uuid, Uuid), ScrapeError> {
    let candidates = catalog_store
        .get_songs_by_title(&parsed.title)
        .map_err(|e| ScrapeError::resolution(format!("lookup of '{}' failed: {}", parsed.title, e)))?;

    let song = match candidates.len() {
        0 => {
            return Err(ScrapeError::resolution(format!(
                "no song titled '{}'",
                parsed.title
            )))
        }
        1 => &candidates[0],
        _ => candidates
            .iter()
            .find(|s| s.image == parsed.image)
            .ok_or_else(|| {
                ScrapeError::resolution(format!(
                    "{} songs titled '{}', none with cover '{}'",
                    candidates.len(),
                    parsed.title,
                    parsed.image
                ))
            })?,
    };

    let beatmap = catalog_store
        .get_beatmap(&song.id, parsed.difficulty, parsed.kind)
        .map_err(|e| ScrapeError::resolution(format!("beatmap lookup failed: {}", e)))?
        .ok_or_else(|| {
            ScrapeError::resolution(format!(
                "song '{}' has no {} {} chart",
                parsed.title,
                parsed.kind.as_str(),
                parsed.difficulty.as_str()
            ))
        })?;

    Ok((song.id, beatmap.id))
}
