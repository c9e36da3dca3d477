//! Core traits for the caching system.

/// A typed description of a cacheable request.
///
/// Implementors turn themselves into a stable string that is safe to use as a
/// cache key, and a human readable description for logs.
pub trait QueryKey {
  /// Stable key for the cache map
  fn cache_hash(&self) -> String;

  /// What the key stands for, e.g. "items"
  fn description(&self) -> String;
}

impl QueryKey for str {
  fn cache_hash(&self) -> String {
    self.to_string()
  }

  fn description(&self) -> String {
    self.to_string()
  }
}

impl QueryKey for String {
  fn cache_hash(&self) -> String {
    self.clone()
  }

  fn description(&self) -> String {
    self.clone()
  }
}
