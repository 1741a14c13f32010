//! Per-user sync orchestration: login, profile snapshot, incremental score
//! pull, watermark advancement.

use super::error::ScrapeError;
use super::player;
use super::scores::{self, RecordRef};
use super::session::PortalClient;
use crate::catalog_store::{CatalogStore, NoteCounts};
use crate::crypto::CredentialCipher;
use crate::user_store::{Score, User, UserDataSnapshot, UserStore};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub portal_base_url: String,
    pub http_timeout: Duration,
    /// Politeness delay between per-play detail fetches.
    pub detail_delay: Duration,
    /// Users synced in parallel. Each user holds its own portal session, so
    /// anything above 1 trades politeness for speed.
    pub user_concurrency: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct UserSyncStats {
    pub scores_inserted: usize,
    pub scores_duplicate: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub users_synced: usize,
    pub users_failed: usize,
    pub scores_inserted: usize,
    pub scores_duplicate: usize,
}

pub struct SyncOrchestrator {
    catalog_store: Arc<dyn CatalogStore>,
    user_store: Arc<dyn UserStore>,
    cipher: Arc<CredentialCipher>,
    settings: SyncSettings,
}

impl SyncOrchestrator {
    pub fn new(
        catalog_store: Arc<dyn CatalogStore>,
        user_store: Arc<dyn UserStore>,
        cipher: Arc<CredentialCipher>,
        settings: SyncSettings,
    ) -> Self {
        Self {
            catalog_store,
            user_store,
            cipher,
            settings,
        }
    }

    /// Sync every registered user. A failing user never blocks the others.
    pub async fn sync_all_users(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SyncReport, ScrapeError> {
        let users = self
            .user_store
            .get_all_users()
            .map_err(|e| ScrapeError::resolution(format!("user listing failed: {}", e)))?;
        info!("Starting score sync for {} users", users.len());

        let concurrency = self.settings.user_concurrency.max(1);
        let results: Vec<(String, Result<UserSyncStats, ScrapeError>)> = stream::iter(users)
            .map(|user| async move {
                let name = user.name.clone();
                (name, self.sync_user(&user, cancel).await)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut report = SyncReport::default();
        for (name, result) in results {
            match result {
                Ok(stats) => {
                    info!(
                        "Synced user '{}': {} new scores, {} already present",
                        name, stats.scores_inserted, stats.scores_duplicate
                    );
                    report.users_synced += 1;
                    report.scores_inserted += stats.scores_inserted;
                    report.scores_duplicate += stats.scores_duplicate;
                }
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(e) => {
                    warn!("Sync of user '{}' failed: {}", name, e);
                    report.users_failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn sync_user(
        &self,
        user: &User,
        cancel: &CancellationToken,
    ) -> Result<UserSyncStats, ScrapeError> {
        // audit stamp marks the attempt whether or not it succeeds
        if let Err(e) = self.user_store.update_last_scraped_at(&user.id, Utc::now()) {
            warn!("Failed to stamp last_scraped_at for '{}': {}", user.name, e);
        }

        let sega_id = self.cipher.decrypt(&user.encrypted_sega_id)?;
        let password = self.cipher.decrypt(&user.encrypted_password)?;

        let client = PortalClient::new(&self.settings.portal_base_url, self.settings.http_timeout)?;
        client.login(&sega_id, &password).await?;

        self.capture_player_data(&client, user).await?;

        let record_html = client.get_page("/record").await?;
        let records = scores::list_new_records(&record_html, user.last_played_at)?;
        debug!(
            "User '{}' has {} plays past the watermark",
            user.name,
            records.len()
        );

        let mut pending = Vec::with_capacity(records.len());
        for record in &records {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            let detail_html = client.get_page(&record.detail_path()).await?;
            pending.push(self.build_score(user, record, &detail_html)?);

            tokio::select! {
                _ = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                _ = tokio::time::sleep(self.settings.detail_delay) => {}
            }
        }

        persist_new_scores(
            self.catalog_store.as_ref(),
            self.user_store.as_ref(),
            user,
            &pending,
        )
    }

    async fn capture_player_data(
        &self,
        client: &PortalClient,
        user: &User,
    ) -> Result<(), ScrapeError> {
        let html = client.get_page("/playerData").await?;
        let data = player::parse_player_data(&html)?;

        self.user_store
            .create_user_data_snapshot(&UserDataSnapshot {
                id: Uuid::new_v4(),
                user_id: user.id,
                rating: data.rating,
                season_play_count: data.season_play_count,
                total_play_count: data.total_play_count,
                captured_at: Utc::now(),
            })
            .map_err(|e| ScrapeError::resolution(format!("snapshot persist failed: {}", e)))?;

        if let Some(url) = data.profile_image_url {
            if user.profile_image_url.as_deref() != Some(url.as_str()) {
                if let Err(e) = self.user_store.update_profile_image_url(&user.id, &url) {
                    warn!("Failed to update profile image for '{}': {}", user.name, e);
                }
            }
        }
        Ok(())
    }

    fn build_score(
        &self,
        user: &User,
        record: &RecordRef,
        detail_html: &str,
    ) -> Result<Score, ScrapeError> {
        let parsed = scores::parse_score_detail(detail_html)?;
        let (song_id, beatmap_id) = scores::resolve_score(self.catalog_store.as_ref(), &parsed)?;
        Ok(Score {
            id: Uuid::new_v4(),
            user_id: user.id,
            song_id,
            beatmap_id,
            accuracy: parsed.accuracy,
            max_combo: parsed.max_combo,
            dx_score: parsed.dx_score,
            judgements: parsed.judgements,
            fast: parsed.fast,
            late: parsed.late,
            // the list timestamp is authoritative for the watermark
            played_at: record.played_at,
        })
    }
}

/// Persist scores oldest-first, then advance the watermark to the newest
/// played_at. A failing persist aborts before the watermark moves, so the
/// next run re-lists the same plays and duplicate suppression absorbs the
/// ones that did land.
pub fn persist_new_scores(
    catalog_store: &dyn CatalogStore,
    user_store: &dyn UserStore,
    user: &User,
    pending: &[Score],
) -> Result<UserSyncStats, ScrapeError> {
    let mut stats = UserSyncStats::default();
    for score in pending {
        let inserted = user_store
            .create_score(score)
            .map_err(|e| ScrapeError::resolution(format!("score persist failed: {}", e)))?;
        if inserted {
            stats.scores_inserted += 1;
            backfill_note_counts(catalog_store, score);
        } else {
            stats.scores_duplicate += 1;
        }
    }

    if let Some(newest) = pending.iter().map(|s| s.played_at).max() {
        user_store
            .update_last_played_at(&user.id, newest)
            .map_err(|e| ScrapeError::resolution(format!("watermark update failed: {}", e)))?;
    }
    Ok(stats)
}

/// A play exercises every note of its chart, so the judgement grid of any
/// score gives the chart's note counts. Fills them in for beatmaps the
/// catalog sources never covered.
fn backfill_note_counts(catalog_store: &dyn CatalogStore, score: &Score) {
    let beatmap = match catalog_store.get_beatmap_by_id(&score.beatmap_id) {
        Ok(Some(b)) if b.needs_note_backfill() => b,
        Ok(_) => return,
        Err(e) => {
            warn!("Beatmap lookup for note backfill failed: {}", e);
            return;
        }
    };

    let grid = &score.judgements;
    let notes = NoteCounts {
        tap: grid.tap.total(),
        hold: grid.hold.total(),
        slide: grid.slide.total(),
        touch: grid.touch.total(),
        break_: grid.break_.total(),
    };
    let total = notes.total();
    if total == 0 {
        return;
    }

    let mut updated = beatmap;
    updated.notes = notes;
    updated.total_notes = total;
    updated.max_dx_score = total * 3;
    updated.is_valid = true;
    if let Err(e) = catalog_store.update_beatmap(&updated) {
        warn!("Note backfill of beatmap {} failed: {}", updated.id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_store::{
        Beatmap, BeatmapKind, Difficulty, Song, SqliteCatalogStore,
    };
    use crate::user_store::{JudgementCounts, JudgementGrid, SqliteUserStore};
    use anyhow::{bail, Result};
    use chrono::{DateTime, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn make_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "tester".to_string(),
            encrypted_sega_id: "x".to_string(),
            encrypted_password: "x".to_string(),
            profile_image_url: None,
            last_played_at: None,
            last_scraped_at: None,
            created_at: Utc::now(),
        }
    }

    fn seeded_stores() -> (SqliteCatalogStore, SqliteUserStore, TempDir, User, Uuid, Uuid) {
        let tmp = TempDir::new().unwrap();
        let catalog = SqliteCatalogStore::new(tmp.path().join("catalog.db")).unwrap();
        let users = SqliteUserStore::new(tmp.path().join("users.db")).unwrap();

        let song = Song {
            id: Uuid::new_v4(),
            alt_key: "testsong".to_string(),
            title: "Test Song".to_string(),
            artist: "artist".to_string(),
            genre: "genre".to_string(),
            bpm: String::new(),
            image: "cover.png".to_string(),
            version: String::new(),
            is_utage: false,
            is_available: true,
            is_new: false,
            release_date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            delete_date: None,
        };
        catalog.create_song(&song).unwrap();
        let beatmap = Beatmap {
            id: Uuid::new_v4(),
            song_id: song.id,
            difficulty: Difficulty::Master,
            kind: BeatmapKind::Dx,
            level: "13".to_string(),
            internal_level: None,
            notes: NoteCounts::default(),
            total_notes: 0,
            max_dx_score: 0,
            note_designer: None,
            is_valid: true,
        };
        catalog.create_beatmap(&beatmap).unwrap();

        let user = make_user();
        users.create_user(&user).unwrap();
        (catalog, users, tmp, user, song.id, beatmap.id)
    }

    fn make_score(
        user: &User,
        song_id: Uuid,
        beatmap_id: Uuid,
        played_at: DateTime<Utc>,
    ) -> Score {
        Score {
            id: Uuid::new_v4(),
            user_id: user.id,
            song_id,
            beatmap_id,
            accuracy: "99.1234%".to_string(),
            max_combo: 500,
            dx_score: 1500,
            judgements: JudgementGrid {
                tap: JudgementCounts {
                    critical: 300,
                    perfect: 80,
                    great: 10,
                    good: 5,
                    miss: 5,
                },
                hold: JudgementCounts {
                    critical: 50,
                    ..Default::default()
                },
                slide: JudgementCounts {
                    critical: 60,
                    ..Default::default()
                },
                touch: JudgementCounts {
                    critical: 13,
                    ..Default::default()
                },
                break_: JudgementCounts {
                    critical: 8,
                    ..Default::default()
                },
            },
            fast: 42,
            late: 17,
            played_at,
        }
    }

    #[test]
    fn full_persist_advances_the_watermark() {
        let (catalog, users, _tmp, user, song_id, beatmap_id) = seeded_stores();
        let t1 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 30, 0).unwrap();
        let pending = vec![
            make_score(&user, song_id, beatmap_id, t1),
            make_score(&user, song_id, beatmap_id, t2),
        ];

        let stats = persist_new_scores(&catalog, &users, &user, &pending).unwrap();
        assert_eq!(stats.scores_inserted, 2);
        assert_eq!(stats.scores_duplicate, 0);

        let stored = users.get_user(&user.id).unwrap().unwrap();
        assert_eq!(stored.last_played_at, Some(t2));
    }

    #[test]
    fn empty_run_leaves_the_watermark_alone() {
        let (catalog, users, _tmp, user, _, _) = seeded_stores();
        persist_new_scores(&catalog, &users, &user, &[]).unwrap();
        let stored = users.get_user(&user.id).unwrap().unwrap();
        assert_eq!(stored.last_played_at, None);
    }

    #[test]
    fn re_persisting_after_a_crash_counts_duplicates() {
        let (catalog, users, _tmp, user, song_id, beatmap_id) = seeded_stores();
        let t1 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 30, 0).unwrap();
        let first = make_score(&user, song_id, beatmap_id, t1);
        let second = make_score(&user, song_id, beatmap_id, t2);

        // first run landed only the older score
        persist_new_scores(&catalog, &users, &user, std::slice::from_ref(&first)).unwrap();
        // retry re-persists both; identity suppression absorbs the repeat
        let retry = vec![make_score(&user, song_id, beatmap_id, t1), second];
        let stats = persist_new_scores(&catalog, &users, &user, &retry).unwrap();
        assert_eq!(stats.scores_inserted, 1);
        assert_eq!(stats.scores_duplicate, 1);
        assert_eq!(users.get_scores_for_user(&user.id).unwrap().len(), 2);
    }

    /// Delegating store that fails `create_score` after a set number of
    /// successes.
    struct FlakyUserStore {
        inner: SqliteUserStore,
        successes_allowed: usize,
        calls: AtomicUsize,
    }

    impl UserStore for FlakyUserStore {
        fn get_user(&self, id: &Uuid) -> Result<Option<User>> {
            self.inner.get_user(id)
        }
        fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
            self.inner.get_user_by_name(name)
        }
        fn get_all_users(&self) -> Result<Vec<User>> {
            self.inner.get_all_users()
        }
        fn create_user(&self, user: &User) -> Result<()> {
            self.inner.create_user(user)
        }
        fn update_user_credentials(&self, user: &User) -> Result<()> {
            self.inner.update_user_credentials(user)
        }
        fn update_profile_image_url(&self, user_id: &Uuid, url: &str) -> Result<()> {
            self.inner.update_profile_image_url(user_id, url)
        }
        fn update_last_played_at(&self, user_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
            self.inner.update_last_played_at(user_id, at)
        }
        fn update_last_scraped_at(&self, user_id: &Uuid, at: DateTime<Utc>) -> Result<()> {
            self.inner.update_last_scraped_at(user_id, at)
        }
        fn create_user_data_snapshot(&self, snapshot: &UserDataSnapshot) -> Result<()> {
            self.inner.create_user_data_snapshot(snapshot)
        }
        fn get_snapshots_for_user(&self, user_id: &Uuid) -> Result<Vec<UserDataSnapshot>> {
            self.inner.get_snapshots_for_user(user_id)
        }
        fn create_score(&self, score: &Score) -> Result<bool> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.successes_allowed {
                bail!("simulated storage failure");
            }
            self.inner.create_score(score)
        }
        fn get_scores_for_user(&self, user_id: &Uuid) -> Result<Vec<Score>> {
            self.inner.get_scores_for_user(user_id)
        }
    }

    #[test]
    fn failed_persist_leaves_the_watermark_unchanged() {
        let (catalog, users, _tmp, user, song_id, beatmap_id) = seeded_stores();
        let flaky = FlakyUserStore {
            inner: users,
            successes_allowed: 1,
            calls: AtomicUsize::new(0),
        };
        let t1 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 30, 0).unwrap();
        let pending = vec![
            make_score(&user, song_id, beatmap_id, t1),
            make_score(&user, song_id, beatmap_id, t2),
        ];

        assert!(persist_new_scores(&catalog, &flaky, &user, &pending).is_err());

        let stored = flaky.get_user(&user.id).unwrap().unwrap();
        assert_eq!(stored.last_played_at, None);
        // the older score did land and will be a duplicate on retry
        assert_eq!(flaky.get_scores_for_user(&user.id).unwrap().len(), 1);
    }

    #[test]
    fn first_persisted_score_backfills_note_counts() {
        let (catalog, users, _tmp, user, song_id, beatmap_id) = seeded_stores();
        let t1 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 0, 0).unwrap();
        let score = make_score(&user, song_id, beatmap_id, t1);

        persist_new_scores(&catalog, &users, &user, std::slice::from_ref(&score)).unwrap();

        let beatmap = catalog.get_beatmap_by_id(&beatmap_id).unwrap().unwrap();
        // tap 400 + hold 50 + slide 60 + touch 13 + break 8
        assert_eq!(beatmap.total_notes, 531);
        assert_eq!(beatmap.notes.tap, 400);
        assert_eq!(beatmap.notes.touch, 13);
        assert_eq!(beatmap.max_dx_score, 531 * 3);
        assert!(beatmap.is_valid);
    }

    #[test]
    fn backfill_skips_beatmaps_with_known_counts() {
        let (catalog, users, _tmp, user, song_id, beatmap_id) = seeded_stores();
        let mut beatmap = catalog.get_beatmap_by_id(&beatmap_id).unwrap().unwrap();
        beatmap.total_notes = 999;
        beatmap.max_dx_score = 2997;
        catalog.update_beatmap(&beatmap).unwrap();

        let t1 = Utc.with_ymd_and_hms(2025, 2, 1, 3, 0, 0).unwrap();
        let score = make_score(&user, song_id, beatmap_id, t1);
        persist_new_scores(&catalog, &users, &user, std::slice::from_ref(&score)).unwrap();

        let stored = catalog.get_beatmap_by_id(&beatmap_id).unwrap().unwrap();
        assert_eq!(stored.total_notes, 999);
    }
}
