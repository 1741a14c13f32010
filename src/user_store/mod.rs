mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{JudgementCounts, JudgementGrid, Score, User, UserDataSnapshot};
pub use store::SqliteUserStore;
pub use trait_def::UserStore;
