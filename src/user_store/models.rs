//! User, snapshot and score models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Portal account id, encrypted at rest.
    pub encrypted_sega_id: String,
    pub encrypted_password: String,
    pub profile_image_url: Option<String>,
    /// High-water mark: played_at of the newest persisted score. Advanced
    /// only after a fully successful sync run.
    pub last_played_at: Option<DateTime<Utc>>,
    /// Audit stamp, set at the start of every sync attempt.
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only profile snapshot taken once per sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDataSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub rating: u32,
    pub season_play_count: u32,
    pub total_play_count: u32,
    pub captured_at: DateTime<Utc>,
}

/// Judgement breakdown for a single note type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementCounts {
    pub critical: u32,
    pub perfect: u32,
    pub great: u32,
    pub good: u32,
    pub miss: u32,
}

impl JudgementCounts {
    pub fn total(&self) -> u32 {
        self.critical + self.perfect + self.great + self.good + self.miss
    }
}

/// The full 5×5 judgement table of a play.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgementGrid {
    pub tap: JudgementCounts,
    pub hold: JudgementCounts,
    pub slide: JudgementCounts,
    pub touch: JudgementCounts,
    pub break_: JudgementCounts,
}

/// One play record. Immutable once created; identity for duplicate
/// suppression is (user_id, beatmap_id, played_at).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: Uuid,
    pub user_id: Uuid,
    pub song_id: Uuid,
    pub beatmap_id: Uuid,
    /// Achievement text as displayed, e.g. "100.5481%".
    pub accuracy: String,
    pub max_combo: u32,
    pub dx_score: u32,
    pub judgements: JudgementGrid,
    pub fast: u32,
    pub late: u32,
    pub played_at: DateTime<Utc>,
}
