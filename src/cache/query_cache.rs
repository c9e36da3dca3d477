//! Shared, typed handle over a `TtlCache` of JSON values.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::time::Duration;
use tracing::{debug, warn};

use super::traits::QueryKey;
use super::ttl::TtlCache;

/// Cache shared by every query in the application.
///
/// Values are stored as `serde_json::Value` so one cache can hold any
/// serializable response. Construct one at startup and hand clones to
/// consumers; clones share the same storage.
#[derive(Clone, Default)]
pub struct QueryCache {
  inner: Arc<Mutex<TtlCache<serde_json::Value>>>,
}

impl QueryCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> MutexGuard<'_, TtlCache<serde_json::Value>> {
    // The map holds no invariants a panicking writer could break
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Look up a typed value. Values that no longer deserialize are a miss.
  pub fn get<T, K>(&self, key: &K) -> Option<T>
  where
    T: DeserializeOwned,
    K: QueryKey + ?Sized,
  {
    let hash = key.cache_hash();
    let value = self.lock().get(&hash);
    match value {
      Some(value) => match serde_json::from_value(value) {
        Ok(data) => {
          debug!(key = %key.description(), "cache hit");
          Some(data)
        }
        Err(e) => {
          warn!(key = %key.description(), error = %e, "cached value has unexpected shape");
          None
        }
      },
      None => {
        debug!(key = %key.description(), "cache miss");
        None
      }
    }
  }

  /// Store a typed value with the given time-to-live.
  pub fn set<T, K>(&self, key: &K, value: &T, ttl: Duration)
  where
    T: Serialize,
    K: QueryKey + ?Sized,
  {
    match serde_json::to_value(value) {
      Ok(json) => self.lock().set(key.cache_hash(), json, ttl),
      Err(e) => warn!(key = %key.description(), error = %e, "failed to serialize value for cache"),
    }
  }

  /// Remove an entry. Returns whether one existed.
  pub fn delete<K: QueryKey + ?Sized>(&self, key: &K) -> bool {
    let removed = self.lock().delete(&key.cache_hash());
    if removed {
      debug!(key = %key.description(), "cache entry invalidated");
    }
    removed
  }

  pub fn clear(&self) {
    self.lock().clear();
  }
}
