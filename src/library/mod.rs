//! Library module - local persistence
//!
//! Everything the player remembers between runs lives in a data directory as
//! one JSON document per key:
//!
//! - `store`: key/value documents plus change notifications (in-process and cross-process)
//! - `collection`: liked songs and user playlists
//! - `history`: listening history and the dwell tracker that feeds it
//! - `settings`: theme and preferred music source
//! - `stats`: listening statistics

mod store;
mod collection;
mod history;
mod settings;
mod stats;

pub use store::{
    ChangeOrigin, StorageEvent, Store, HISTORY_KEY, LIKED_SONGS_KEY, PLAYLISTS_KEY,
    THEME_KEY, TOKEN_KEY,
};
pub use collection::{LocalLibrary, PlaylistUpdate};
pub use history::{DwellTracker, ListeningHistory};
pub use settings::{Settings, theme_by_id};
pub use stats::{ListeningStats, count_artists, ranked};
