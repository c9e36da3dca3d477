//! In-memory key/value store with per-entry expiry.

use std::collections::HashMap;
use tokio::time::{Duration, Instant};

/// A cached value together with the instant it stops being served.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
  pub value: V,
  pub expires_at: Instant,
}

impl<V> CacheEntry<V> {
  pub fn new(value: V, ttl: Duration) -> Self {
    Self {
      value,
      expires_at: Instant::now() + ttl,
    }
  }

  pub fn is_expired(&self) -> bool {
    Instant::now() >= self.expires_at
  }
}

/// TTL cache with lazy expiry.
///
/// There is no background sweep: an expired entry stays in the map until the
/// next `get` for its key drops it. Callers that share one cache across tasks
/// must wrap it themselves (see `QueryCache`).
#[derive(Debug)]
pub struct TtlCache<V> {
  entries: HashMap<String, CacheEntry<V>>,
}

impl<V> Default for TtlCache<V> {
  fn default() -> Self {
    Self {
      entries: HashMap::new(),
    }
  }
}

impl<V: Clone> TtlCache<V> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store `value` under `key`, replacing any previous entry.
  pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
    self.entries.insert(key.into(), CacheEntry::new(value, ttl));
  }

  /// Get a live value. Expired entries are removed and reported as a miss.
  pub fn get(&mut self, key: &str) -> Option<V> {
    match self.entries.get(key) {
      Some(entry) if entry.is_expired() => {
        self.entries.remove(key);
        None
      }
      Some(entry) => Some(entry.value.clone()),
      None => None,
    }
  }

  /// Remove an entry regardless of expiry. Returns whether one existed.
  pub fn delete(&mut self, key: &str) -> bool {
    self.entries.remove(key).is_some()
  }

  /// Number of stored entries, including expired ones not yet evicted.
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test(start_paused = true)]
  async fn test_get_before_and_after_ttl() {
    let mut cache = TtlCache::new();
    cache.set("items", 7, Duration::from_millis(100));

    assert_eq!(cache.get("items"), Some(7));

    tokio::time::advance(Duration::from_millis(99)).await;
    assert_eq!(cache.get("items"), Some(7));

    tokio::time::advance(Duration::from_millis(1)).await;
    assert_eq!(cache.get("items"), None);
  }

  #[tokio::test(start_paused = true)]
  async fn test_expired_entry_evicted_lazily() {
    let mut cache = TtlCache::new();
    cache.set("a", "x".to_string(), Duration::from_millis(10));
    tokio::time::advance(Duration::from_millis(20)).await;

    // Still stored until someone asks for it
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("a"), None);
    assert!(cache.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_set_overwrites_value_and_expiry() {
    let mut cache = TtlCache::new();
    cache.set("k", 1, Duration::from_millis(10));
    cache.set("k", 2, Duration::from_secs(60));
    tokio::time::advance(Duration::from_millis(50)).await;

    assert_eq!(cache.get("k"), Some(2));
  }

  #[test]
  fn test_delete() {
    let mut cache = TtlCache::new();
    cache.set("k", 1, Duration::from_secs(1));

    assert!(cache.delete("k"));
    assert!(!cache.delete("k"));
    assert_eq!(cache.get("k"), None);
  }

  #[test]
  fn test_miss_on_unknown_key() {
    let mut cache: TtlCache<u32> = TtlCache::new();
    assert_eq!(cache.get("nope"), None);
  }
}
