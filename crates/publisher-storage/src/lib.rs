//! Persistence for the NFT publisher: a SQLite-backed collection store and
//! a filesystem media store.

pub mod media;
pub mod sqlite;

pub use media::LocalMediaStore;
pub use sqlite::SqliteCollectionStore;
