//! Accretive artwork cache persisted as one JSON blob.

use std::collections::HashMap;
use std::sync::Mutex;

use log::{debug, warn};

use crate::kv_store::KeyValueStore;

struct CacheState {
    entries: HashMap<String, String>,
    store: Box<dyn KeyValueStore>,
}

/// Maps cache keys to image URLs; an empty string records "nothing found".
///
/// Entries are never expired or removed. Every write re-reads the stored
/// blob, merges the new entry and writes the whole blob back.
pub struct ArtworkCache {
    blob_key: String,
    state: Mutex<CacheState>,
}

impl ArtworkCache {
    /// Loads the blob stored under `blob_key`. Missing or corrupt blobs start empty.
    pub fn load(store: Box<dyn KeyValueStore>, blob_key: impl Into<String>) -> Self {
        let blob_key = blob_key.into();
        let entries = Self::read_blob(store.as_ref(), &blob_key).unwrap_or_default();
        debug!(
            "Artwork cache: loaded {} entries from '{}'",
            entries.len(),
            blob_key
        );
        Self {
            blob_key,
            state: Mutex::new(CacheState { entries, store }),
        }
    }

    fn read_blob(store: &dyn KeyValueStore, blob_key: &str) -> Option<HashMap<String, String>> {
        let raw = match store.get(blob_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(error) => {
                warn!("Artwork cache: failed to read '{}': {}", blob_key, error);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => Some(entries),
            Err(error) => {
                warn!("Artwork cache: ignoring corrupt blob '{}': {}", blob_key, error);
                None
            }
        }
    }

    /// `Some("")` is a cached negative result.
    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        state.entries.get(key).cloned()
    }

    /// Records `value` for `key` and persists the whole cache.
    ///
    /// Persistence failures are logged; the in-memory entry is kept regardless.
    pub fn put(&self, key: &str, value: &str) {
        let Ok(mut state) = self.state.lock() else {
            warn!("Artwork cache: lock poisoned, dropping write for '{}'", key);
            return;
        };
        state.entries.insert(key.to_string(), value.to_string());

        let mut persisted = Self::read_blob(state.store.as_ref(), &self.blob_key)
            .unwrap_or_else(|| state.entries.clone());
        persisted.insert(key.to_string(), value.to_string());
        let serialized = match serde_json::to_string(&persisted) {
            Ok(serialized) => serialized,
            Err(error) => {
                warn!("Artwork cache: failed to serialize cache: {}", error);
                return;
            }
        };
        if let Err(error) = state.store.set(&self.blob_key, &serialized) {
            warn!(
                "Artwork cache: failed to persist '{}' ({} entries): {}",
                self.blob_key,
                persisted.len(),
                error
            );
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.entries.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cached "nothing found" entries.
    pub fn negative_len(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.entries.values().filter(|url| url.is_empty()).count())
            .unwrap_or_default()
    }
}
