use crate::{SharedStore, StorageError};
use chrono::{DateTime, Utc};
use mailpilot_core::EnrichedMessage;
use serde::{Deserialize, Serialize};

pub const LIST_CACHE_KEY: &str = "message_list_cache";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CachedList {
    pub saved_at: DateTime<Utc>,
    pub messages: Vec<EnrichedMessage>,
}

/// Last successfully fetched inbox list.
#[derive(Clone)]
pub struct ListCache {
    store: SharedStore,
}

impl ListCache {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub fn save(&self, messages: &[EnrichedMessage]) -> Result<(), StorageError> {
        let entry = CachedList {
            saved_at: Utc::now(),
            messages: messages.to_vec(),
        };
        self.store
            .set(LIST_CACHE_KEY, &serde_json::to_string(&entry)?)
    }

    /// A cache entry that no longer parses is dropped and reported as empty.
    pub fn load(&self) -> Result<Option<CachedList>, StorageError> {
        let Some(raw) = self.store.get(LIST_CACHE_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                tracing::warn!("discarding unreadable list cache: {err}");
                self.store.remove(LIST_CACHE_KEY)?;
                Ok(None)
            }
        }
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(LIST_CACHE_KEY)
    }
}
