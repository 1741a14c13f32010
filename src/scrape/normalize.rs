//! Text normalization and JST time handling for scraped pages.

use super::error::ScrapeError;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Everything outside kanji, kana, ascii/fullwidth alphanumerics and the
    // handful of iteration marks is stripped when building the identity key.
    static ref ALT_KEY_STRIP: Regex =
        Regex::new("[^一-龠ぁ-ゔァ-ヴーa-zA-Z0-9ａ-ｚＡ-Ｚ０-９々〆〤ヶ]+").unwrap();
    static ref TRACK_PREFIX: Regex = Regex::new("TRACK 0[0-9]").unwrap();
    static ref NON_DIGIT: Regex = Regex::new(r"[^\d]").unwrap();
}

/// Deterministic fuzzy identity key for a song: lowercased title+artist with
/// everything outside the allowed scripts removed. Matches songs across
/// sources that disagree on punctuation and whitespace.
pub fn alt_key(title: &str, artist: &str) -> String {
    let combined = format!("{}{}", title, artist).to_lowercase();
    ALT_KEY_STRIP.replace_all(&combined, "").into_owned()
}

fn jst() -> FixedOffset {
    // UTC+9, no DST
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// Strip the leading `TRACK 0x` label from a play timestamp cell.
pub fn strip_track_prefix(value: &str) -> String {
    TRACK_PREFIX.replace_all(value, "").trim().to_string()
}

/// Parse a portal play timestamp (`TRACK 0x` prefix optional, then
/// `YYYY/MM/DD HH:MM` in JST) to a UTC instant.
pub fn parse_played_at(value: &str) -> Result<DateTime<Utc>, ScrapeError> {
    let cleaned = strip_track_prefix(value).replace('/', "-");
    let naive = NaiveDateTime::parse_from_str(&cleaned, "%Y-%m-%d %H:%M")
        .map_err(|e| ScrapeError::parse(format!("bad play timestamp '{}': {}", value, e)))?;
    jst_to_utc(naive, value)
}

/// Parse a `YYYY-MM-DD` (or `YYYY/MM/DD`) calendar date as midnight JST.
pub fn parse_jst_date(value: &str) -> Result<DateTime<Utc>, ScrapeError> {
    let cleaned = value.trim().replace('/', "-");
    let date = NaiveDate::parse_from_str(&cleaned, "%Y-%m-%d")
        .map_err(|e| ScrapeError::parse(format!("bad date '{}': {}", value, e)))?;
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ScrapeError::parse(format!("bad date '{}'", value)))?;
    jst_to_utc(naive, value)
}

/// Parse the official catalog's packed `YYMMDD` release field as a
/// 20YY-MM-DD midnight-JST instant.
pub fn parse_packed_release(value: &str) -> Result<DateTime<Utc>, ScrapeError> {
    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ScrapeError::parse(format!(
            "bad packed release date '{}'",
            value
        )));
    }
    parse_jst_date(&format!("20{}-{}-{}", &value[..2], &value[2..4], &value[4..6]))
}

fn jst_to_utc(naive: NaiveDateTime, original: &str) -> Result<DateTime<Utc>, ScrapeError> {
    jst()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ScrapeError::parse(format!("ambiguous timestamp '{}'", original)))
}

/// Keep only ascii digits.
pub fn digits(value: &str) -> String {
    NON_DIGIT.replace_all(value, "").into_owned()
}

/// Parse the digits embedded in a cell, e.g. `"1,234回"` -> 1234.
pub fn parse_digits(value: &str) -> Result<u32, ScrapeError> {
    let cleaned = digits(value);
    cleaned
        .parse()
        .map_err(|e| ScrapeError::parse(format!("no number in '{}': {}", value, e)))
}
