use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::sync::Mutex;

use super::Cache;

/// Bounded in-process cache.
///
/// Holds at most `max_entries`; a write past the cap evicts the oldest
/// entries in insertion order. Overwriting a key makes it the newest.
pub struct MemoryCache {
    entries: Mutex<IndexMap<String, String>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            max_entries,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: String) {
        let mut entries = self.entries.lock().await;
        entries.shift_remove(key);
        entries.insert(key.to_string(), value);
        while entries.len() > self.max_entries {
            entries.shift_remove_index(0);
        }
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().await.shift_remove(key);
    }
}
