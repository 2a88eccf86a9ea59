use serde_json::Value;
use std::time::Duration;

use super::port::CachePort;

/// A [`CachePort`] wrapper that prefixes every key with a scope.
///
/// Lets several scopes share one backing cache without colliding.
pub struct Namespaced<C> {
    pub inner: C,
    pub namespace: String,
}

impl<C> Namespaced<C> {
    pub fn new(inner: C, namespace: impl Into<String>) -> Self {
        Self {
            inner,
            namespace: namespace.into(),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}/{}", self.namespace, key)
    }
}

impl<C: CachePort> CachePort for Namespaced<C> {
    fn read(&self, key: &str) -> Option<Value> {
        self.inner.read(&self.key(key))
    }

    fn write(&self, key: &str, value: Value, ttl: Duration) {
        self.inner.write(&self.key(key), value, ttl)
    }
}

impl<C: CachePort> CachePort for &C {
    fn read(&self, key: &str) -> Option<Value> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: Value, ttl: Duration) {
        (**self).write(key, value, ttl)
    }
}
