//! Inventory client paired with the shared query cache.

use sha2::{Digest, Sha256};

use crate::cache::{QueryCache, QueryKey};
use crate::config::Config;
use crate::query::{CachedQuery, QueryOptions};

use super::client::InventoryClient;
use super::types::{DashboardStats, Resource};

// ============================================================================
// Query key types
// ============================================================================

/// Query key types for inventory API calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InventoryQueryKey {
  /// A whole collection, e.g. all items
  Collection { path: &'static str },
  /// Dashboard counters
  DashboardStats,
}

impl InventoryQueryKey {
  pub fn collection<T: Resource>() -> Self {
    Self::Collection { path: T::PATH }
  }
}

impl QueryKey for InventoryQueryKey {
  fn cache_hash(&self) -> String {
    let input = match self {
      Self::Collection { path } => format!("collection:{}", path),
      Self::DashboardStats => "dashboard:stats".to_string(),
    };

    // SHA256 hash for stable, fixed-length keys
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }

  fn description(&self) -> String {
    match self {
      Self::Collection { path } => path.to_string(),
      Self::DashboardStats => "dashboard stats".to_string(),
    }
  }
}

/// Inventory client with transparent caching support.
///
/// Reads go through `CachedQuery`s sharing one `QueryCache`; writes go
/// straight to the API and invalidate the collection they touched.
#[derive(Clone)]
pub struct CachedInventoryClient {
  inner: InventoryClient,
  cache: QueryCache,
  options: QueryOptions,
}

impl CachedInventoryClient {
  pub fn new(inner: InventoryClient, cache: QueryCache, config: &Config) -> Self {
    Self {
      inner,
      cache,
      options: config.cache.query_options(),
    }
  }

  pub fn client(&self) -> &InventoryClient {
    &self.inner
  }

  /// Query for a whole collection.
  pub fn list_query<T: Resource>(&self) -> CachedQuery<Vec<T>> {
    let inner = self.inner.clone();
    CachedQuery::new(
      &InventoryQueryKey::collection::<T>(),
      self.cache.clone(),
      move || {
        let inner = inner.clone();
        async move { inner.list::<T>().await }
      },
    )
    .with_options(self.options)
  }

  pub fn dashboard_query(&self) -> CachedQuery<DashboardStats> {
    let inner = self.inner.clone();
    CachedQuery::new(
      &InventoryQueryKey::DashboardStats,
      self.cache.clone(),
      move || {
        let inner = inner.clone();
        async move { inner.dashboard_stats().await }
      },
    )
    .with_options(self.options)
  }

  /// Drop cached data a write to `T` made stale.
  pub fn invalidate<T: Resource>(&self) {
    self.cache.delete(&InventoryQueryKey::collection::<T>());
    self.cache.delete(&InventoryQueryKey::DashboardStats);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::inventory::types::{Category, InventoryItem};

  #[test]
  fn test_collection_keys_are_stable_and_distinct() {
    let items = InventoryQueryKey::collection::<InventoryItem>();
    let categories = InventoryQueryKey::collection::<Category>();

    let again = InventoryQueryKey::collection::<InventoryItem>();
    assert_eq!(items.cache_hash(), again.cache_hash());
    assert_ne!(items.cache_hash(), categories.cache_hash());
    assert_eq!(items.cache_hash().len(), 64);
    assert_eq!(items.description(), "items");
  }

  #[tokio::test]
  async fn test_invalidate_drops_collection_and_stats() {
    let cache = QueryCache::new();
    let ttl = std::time::Duration::from_secs(60);
    let items = InventoryQueryKey::collection::<InventoryItem>();
    let categories = InventoryQueryKey::collection::<Category>();
    let stats = InventoryQueryKey::DashboardStats;
    cache.set(&items, &Vec::<u32>::new(), ttl);
    cache.set(&categories, &Vec::<u32>::new(), ttl);
    cache.set(&stats, &DashboardStats::default(), ttl);

    let config = test_config();
    let inner = InventoryClient::new(&config).unwrap();
    let client = CachedInventoryClient::new(inner, cache.clone(), &config);
    client.invalidate::<InventoryItem>();

    assert!(cache.get::<Vec<u32>, _>(&items).is_none());
    assert!(cache.get::<DashboardStats, _>(&stats).is_none());
    assert!(cache.get::<Vec<u32>, _>(&categories).is_some());
  }

  fn test_config() -> Config {
    serde_yaml::from_str("api:\n  url: http://localhost:3001\n  username: admin\n").unwrap()
  }
}
