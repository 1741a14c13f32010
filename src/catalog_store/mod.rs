mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{Beatmap, BeatmapKind, Difficulty, NoteCounts, Song};
pub use store::SqliteCatalogStore;
pub use trait_def::CatalogStore;
