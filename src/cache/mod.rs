//! Client-side caching for API responses.
//!
//! - `TtlCache` is the plain key/value store with lazy expiry
//! - `QueryCache` is the shared, typed handle the rest of the app uses
//! - `QueryKey` turns request descriptions into stable cache keys

mod query_cache;
mod traits;
mod ttl;

pub use query_cache::QueryCache;
pub use traits::QueryKey;
pub use ttl::{CacheEntry, TtlCache};
