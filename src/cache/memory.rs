use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::warn;

use super::port::CachePort;

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Process-local cache. Expired entries are dropped lazily on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Entries are inserted and removed whole, so a poisoned map is still consistent.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.entries.read().unwrap_or_else(|poisoned| {
            warn!("Cache lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.entries.write().unwrap_or_else(|poisoned| {
            warn!("Cache lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl CachePort for MemoryCache {
    fn read(&self, key: &str) -> Option<Value> {
        {
            let entries = self.read_entries();
            let entry = entries.get(key)?;
            if Instant::now() < entry.expires_at {
                return Some(entry.value.clone());
            }
        }
        self.write_entries().remove(key);
        None
    }

    fn write(&self, key: &str, value: Value, ttl: Duration) {
        self.write_entries().insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_read_back_within_ttl() {
        let cache = MemoryCache::new();
        cache.write("k", json!({"n": 1}), Duration::from_secs(60));
        assert_eq!(cache.read("k"), Some(json!({"n": 1})));
        assert_eq!(cache.read("other"), None);
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let cache = MemoryCache::new();
        cache.write("k", json!(1), Duration::ZERO);
        assert_eq!(cache.read("k"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_poisoned_lock_keeps_serving() {
        let cache = MemoryCache::new();
        cache.write("k", json!(1), Duration::from_secs(60));

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = cache.entries.write().unwrap();
            panic!("writer died");
        }));
        assert!(cache.entries.is_poisoned());

        assert_eq!(cache.read("k"), Some(json!(1)));
        cache.write("j", json!(2), Duration::from_secs(60));
        assert_eq!(cache.len(), 2);
    }
}
