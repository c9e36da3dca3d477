//! Cached async queries with stale-while-revalidate.
//!
//! Inspired by TanStack Query, `CachedQuery<T>` wraps a fetcher with the
//! shared `QueryCache`, and keeps track of loading state, the last good data
//! and the last error.
//!
//! # Example
//!
//! ```ignore
//! let client = client.clone();
//! let mut query = CachedQuery::new("items", cache.clone(), move || {
//!     let client = client.clone();
//!     async move { client.list::<InventoryItem>().await }
//! });
//!
//! // On mount
//! query.load();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use color_eyre::Result;
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::cache::{QueryCache, QueryKey};

/// Default time-to-live for cached query results
pub const DEFAULT_TTL: Duration = Duration::from_millis(120_000);

/// Tuning knobs for a cached query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
  /// How long a successful result is served from cache
  pub ttl: Duration,
  /// Serve cached data and refresh it in the background
  pub stale_while_revalidate: bool,
}

impl Default for QueryOptions {
  fn default() -> Self {
    Self {
      ttl: DEFAULT_TTL,
      stale_while_revalidate: true,
    }
  }
}

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

/// Async query for data fetching backed by the shared cache.
///
/// Fetches run on spawned tasks; their results are delivered over a channel
/// and only applied when `poll()` is called, so all state changes happen on
/// the caller's thread.
pub struct CachedQuery<T> {
  key: String,
  description: String,
  cache: QueryCache,
  options: QueryOptions,
  fetcher: FetcherFn<T>,
  data: Option<T>,
  error: Option<String>,
  loading: bool,
  revalidating: bool,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
}

impl<T> CachedQuery<T>
where
  T: Serialize + DeserializeOwned + Send + 'static,
{
  /// Create a new query. Nothing is fetched until `load()` is called.
  pub fn new<K, F, Fut>(key: &K, cache: QueryCache, fetcher: F) -> Self
  where
    K: QueryKey + ?Sized,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self {
      key: key.cache_hash(),
      description: key.description(),
      cache,
      options: QueryOptions::default(),
      fetcher: Box::new(move || Box::pin(fetcher())),
      data: None,
      error: None,
      loading: false,
      revalidating: false,
      receiver: None,
    }
  }

  pub fn with_options(mut self, options: QueryOptions) -> Self {
    self.options = options;
    self
  }

  pub fn with_stale_while_revalidate(mut self, enabled: bool) -> Self {
    self.options.stale_while_revalidate = enabled;
    self
  }

  /// Last successfully loaded data, kept across failed refreshes.
  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  /// True while a fetch without usable data is in flight.
  pub fn is_loading(&self) -> bool {
    self.loading
  }

  /// True while cached data is shown and a background refresh is running.
  pub fn is_revalidating(&self) -> bool {
    self.revalidating
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }

  /// Load data for the current key: cache first, network on a miss.
  ///
  /// A no-op while a fetch is already in flight.
  pub fn load(&mut self) {
    if self.receiver.is_some() {
      return;
    }

    match self.cache.get::<T, _>(self.key.as_str()) {
      Some(cached) => {
        self.data = Some(cached);
        self.loading = false;
        self.error = None;
        if self.options.stale_while_revalidate {
          self.revalidating = true;
          self.start_fetch();
        }
      }
      None => {
        self.loading = true;
        self.start_fetch();
      }
    }
  }

  /// Switch to a new key (a dependency changed) and load it.
  pub fn set_key<K: QueryKey + ?Sized>(&mut self, key: &K) {
    let hash = key.cache_hash();
    if hash == self.key {
      return;
    }
    self.key = hash;
    self.description = key.description();
    self.receiver = None;
    self.data = None;
    self.error = None;
    self.loading = false;
    self.revalidating = false;
    self.load();
  }

  /// Fetch from the network regardless of what the cache holds.
  pub fn refetch(&mut self) {
    // Drop any pending result so only the newest fetch lands
    self.receiver = None;
    self.revalidating = false;
    self.loading = true;
    self.start_fetch();
  }

  /// Drop the cached entry without fetching.
  pub fn invalidate_cache(&mut self) {
    self.cache.delete(self.key.as_str());
  }

  /// Apply a finished fetch, if any.
  ///
  /// Returns `true` if the state changed. Call this from the event loop tick.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.cache.set(self.key.as_str(), &data, self.options.ttl);
        debug!(key = %self.description, "query fetched");
        self.data = Some(data);
        self.error = None;
        self.finish();
        true
      }
      Ok(Err(error)) => {
        warn!(key = %self.description, error = %error, "query failed");
        self.error = Some(error);
        self.finish();
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.error = Some("Query was cancelled".to_string());
        self.finish();
        true
      }
    }
  }

  fn finish(&mut self) {
    self.receiver = None;
    self.loading = false;
    self.revalidating = false;
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);

    debug!(key = %self.description, background = self.revalidating, "query fetch started");
    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await.map_err(|e| e.to_string());
      // Receiver may have been dropped by a refetch
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for CachedQuery<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("CachedQuery")
      .field("key", &self.description)
      .field("data", &self.data)
      .field("error", &self.error)
      .field("loading", &self.loading)
      .field("revalidating", &self.revalidating)
      .field("options", &self.options)
      .finish_non_exhaustive()
  }
}
