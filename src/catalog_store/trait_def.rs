//! CatalogStore trait definition.

use super::models::{Beatmap, BeatmapKind, Difficulty, Song};
use anyhow::Result;
use uuid::Uuid;

/// Trait for song/beatmap catalog storage backends.
pub trait CatalogStore: Send + Sync {
    // =========================================================================
    // Songs
    // =========================================================================

    fn get_song(&self, id: &Uuid) -> Result<Option<Song>>;

    /// Look up a song by its normalized identity key.
    fn get_song_by_alt_key(&self, alt_key: &str) -> Result<Option<Song>>;

    /// Exact (title, artist) match, used by the official catalog path.
    fn get_song_by_title_and_artist(&self, title: &str, artist: &str) -> Result<Option<Song>>;

    /// All songs sharing a display title. Several songs may collide on title
    /// (std/dx re-releases, covers); callers disambiguate by cover filename.
    fn get_songs_by_title(&self, title: &str) -> Result<Vec<Song>>;

    fn get_all_songs(&self) -> Result<Vec<Song>>;

    fn create_song(&self, song: &Song) -> Result<()>;

    /// Full-row update keyed by id. `delete_date` is written verbatim, so
    /// callers must carry the stored value over when they do not mean to
    /// change it.
    fn update_song(&self, song: &Song) -> Result<()>;

    // =========================================================================
    // Beatmaps
    // =========================================================================

    fn get_beatmap(
        &self,
        song_id: &Uuid,
        difficulty: Difficulty,
        kind: BeatmapKind,
    ) -> Result<Option<Beatmap>>;

    fn get_beatmap_by_id(&self, id: &Uuid) -> Result<Option<Beatmap>>;

    fn get_beatmaps_for_song(&self, song_id: &Uuid) -> Result<Vec<Beatmap>>;

    fn create_beatmap(&self, beatmap: &Beatmap) -> Result<()>;

    fn update_beatmap(&self, beatmap: &Beatmap) -> Result<()>;
}
