use serde_json::Value;
use std::time::Duration;

/// Key-value cache with per-entry time to live.
pub trait CachePort: Send + Sync {
    /// The live value stored under `key`, if any.
    fn read(&self, key: &str) -> Option<Value>;

    fn write(&self, key: &str, value: Value, ttl: Duration);
}
