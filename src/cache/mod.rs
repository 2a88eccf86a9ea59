//! Memoization of computed statistics behind a TTL cache.
//!
//! [`CachePort`] is the contract; [`MemoryCache`] is the in-process
//! implementation and [`Namespaced`] scopes keys on top of any other.

mod memory;
mod namespaced;
mod port;

pub use memory::MemoryCache;
pub use namespaced::Namespaced;
pub use port::CachePort;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::error::Result;

/// Returns the cached value for `key`, computing and storing it on a miss.
///
/// A cached value that no longer deserializes as `T` counts as a miss.
pub fn fetch_with<C, T, F>(cache: &C, key: &str, ttl: Duration, compute: F) -> Result<T>
where
    C: CachePort + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    if let Some(hit) = cache.read(key).and_then(|v| serde_json::from_value(v).ok()) {
        debug!(key, "Cache hit");
        return Ok(hit);
    }

    debug!(key, "Cache miss");
    let value = compute()?;
    cache.write(key, serde_json::to_value(&value)?, ttl);
    Ok(value)
}
