use super::{StoreResult, StoredAction};
use crate::constants::DEFAULT_STORAGE_NAME;
use dashmap::DashMap;
use tracing::debug;

/// Backing store for cached action results.
///
/// Only the get/put/key contract matters here; eviction is the backend's business. Writers
/// never mutate an existing entry: callers guarantee a single writer per key.
pub trait ActionStore: Send + Sync {
    /// Store name, used in logs
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> StoreResult<Option<StoredAction>>;

    fn put(&self, key: &str, entry: StoredAction) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<Option<StoredAction>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide in-memory store
#[derive(Debug)]
pub struct InMemoryActionStore {
    name: String,
    entries: DashMap<String, StoredAction>,
}

impl InMemoryActionStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for InMemoryActionStore {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_NAME)
    }
}

impl ActionStore for InMemoryActionStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> StoreResult<Option<StoredAction>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn put(&self, key: &str, entry: StoredAction) -> StoreResult<()> {
        debug!(storage = %self.name, key = %key, "Storing action result");
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<Option<StoredAction>> {
        Ok(self.entries.remove(key).map(|(_, entry)| entry))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
