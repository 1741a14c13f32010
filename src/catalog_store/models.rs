//! Catalog data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chart difficulty tier as shown on the portal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Basic,
    Advanced,
    Expert,
    Master,
    Remaster,
    Utage,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Basic => "basic",
            Difficulty::Advanced => "advanced",
            Difficulty::Expert => "expert",
            Difficulty::Master => "master",
            Difficulty::Remaster => "remaster",
            Difficulty::Utage => "utage",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(Difficulty::Basic),
            "advanced" => Some(Difficulty::Advanced),
            "expert" => Some(Difficulty::Expert),
            "master" => Some(Difficulty::Master),
            "remaster" => Some(Difficulty::Remaster),
            "utage" => Some(Difficulty::Utage),
            _ => None,
        }
    }
}

/// Chart family. `Std` and `Dx` are the two regular layouts, `Utage` the
/// special party charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatmapKind {
    Std,
    Dx,
    Utage,
}

impl BeatmapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BeatmapKind::Std => "std",
            BeatmapKind::Dx => "dx",
            BeatmapKind::Utage => "utage",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "std" => Some(BeatmapKind::Std),
            "dx" => Some(BeatmapKind::Dx),
            "utage" => Some(BeatmapKind::Utage),
            _ => None,
        }
    }
}

/// Per-type note counts of a chart. `break_` carries a trailing underscore
/// because `break` is reserved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCounts {
    pub tap: u32,
    pub hold: u32,
    pub slide: u32,
    pub touch: u32,
    pub break_: u32,
}

impl NoteCounts {
    pub fn total(&self) -> u32 {
        self.tap + self.hold + self.slide + self.touch + self.break_
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: Uuid,
    /// Normalized title+artist identity key, see `scrape::normalize::alt_key`.
    pub alt_key: String,
    pub title: String,
    pub artist: String,
    pub genre: String,
    /// Free-form BPM text from the source, may be empty.
    pub bpm: String,
    /// Cover image filename, no path component.
    pub image: String,
    /// Game version label, e.g. "BUDDiES PLUS".
    pub version: String,
    pub is_utage: bool,
    pub is_available: bool,
    pub is_new: bool,
    pub release_date: DateTime<Utc>,
    pub delete_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beatmap {
    pub id: Uuid,
    pub song_id: Uuid,
    pub difficulty: Difficulty,
    pub kind: BeatmapKind,
    /// Level label as displayed, e.g. "13+".
    pub level: String,
    pub internal_level: Option<f64>,
    pub notes: NoteCounts,
    /// 0 until measured, either from the wiki or backfilled from the first
    /// fully-detailed score.
    pub total_notes: u32,
    pub max_dx_score: u32,
    pub note_designer: Option<String>,
    pub is_valid: bool,
}

impl Beatmap {
    /// A chart whose note counts have never been measured. Eligible for
    /// backfill from score details.
    pub fn needs_note_backfill(&self) -> bool {
        self.total_notes == 0
    }
}
