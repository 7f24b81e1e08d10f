mod cache;
mod error;
mod store;

pub use cache::{CachedList, ListCache, LIST_CACHE_KEY};
pub use error::StorageError;
pub use store::{FileStore, KeyValueStore, MemoryStore, SharedStore};
