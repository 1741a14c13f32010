//! UserStore trait definition.

use super::models::{Score, User, UserDataSnapshot};
use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Trait for user/score storage backends.
pub trait UserStore: Send + Sync {
    // =========================================================================
    // Users
    // =========================================================================

    fn get_user(&self, id: &Uuid) -> Result<Option<User>>;

    fn get_user_by_name(&self, name: &str) -> Result<Option<User>>;

    fn get_all_users(&self) -> Result<Vec<User>>;

    fn create_user(&self, user: &User) -> Result<()>;

    /// Replace the stored encrypted credentials of an existing user.
    fn update_user_credentials(&self, user: &User) -> Result<()>;

    fn update_profile_image_url(&self, user_id: &Uuid, url: &str) -> Result<()>;

    /// Advance the sync watermark. Callers only move it forward.
    fn update_last_played_at(&self, user_id: &Uuid, at: DateTime<Utc>) -> Result<()>;

    fn update_last_scraped_at(&self, user_id: &Uuid, at: DateTime<Utc>) -> Result<()>;

    // =========================================================================
    // Snapshots
    // =========================================================================

    fn create_user_data_snapshot(&self, snapshot: &UserDataSnapshot) -> Result<()>;

    fn get_snapshots_for_user(&self, user_id: &Uuid) -> Result<Vec<UserDataSnapshot>>;

    // =========================================================================
    // Scores
    // =========================================================================

    /// Insert a score. Returns false when a score with the same
    /// (user, beatmap, played_at) identity already exists, which makes
    /// crash-retried persists idempotent.
    fn create_score(&self, score: &Score) -> Result<bool>;

    fn get_scores_for_user(&self, user_id: &Uuid) -> Result<Vec<Score>>;
}
