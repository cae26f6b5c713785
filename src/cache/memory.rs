//! In-memory tier holding decoded values.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::key::CacheKey;

/// Process-shared map from cache key to a decoded value.
///
/// Values are handed out as `Arc`s so a hit never copies the decoded
/// object. Entries are never evicted.
pub struct MemoryTier<V> {
  entries: RwLock<HashMap<CacheKey, Arc<V>>>,
}

impl<V> MemoryTier<V> {
  pub fn new() -> Self {
    Self {
      entries: RwLock::new(HashMap::new()),
    }
  }

  pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
    // A panicking writer cannot leave the map half-updated, so poison is ignored
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.get(key).cloned()
  }

  pub fn insert(&self, key: CacheKey, value: Arc<V>) {
    let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
    entries.insert(key, value);
  }

  #[cfg(test)]
  pub fn len(&self) -> usize {
    let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
    entries.len()
  }
}

impl<V> Default for MemoryTier<V> {
  fn default() -> Self {
    Self::new()
  }
}
