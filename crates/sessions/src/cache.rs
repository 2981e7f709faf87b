//! Bounded-TTL cache for session-scoped derived data.
//!
//! Expiry is checked lazily on read; no sweeper task. Each session owns its
//! own cache, so entries for different tenants never share a map.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::Mutex,
    time::{Duration, Instant},
};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Read-through TTL cache. `get` returns `None` once the entry's deadline
/// has passed, removing it as a side effect.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            },
            None => None,
        }
    }

    /// Store with the cache's fixed TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, Entry {
                value,
                expires_at: Instant::now() + ttl,
            });
        }
    }

    pub fn invalidate(&self, key: &K) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_value_before_expiry() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(300));
        cache.insert("groups", 7);
        assert_eq!(cache.get(&"groups"), Some(7));
    }

    #[test]
    fn expires_lazily_on_read() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(300));
        cache.insert_with_ttl("groups", 7, Duration::from_millis(20));
        assert_eq!(cache.get(&"groups"), Some(7));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"groups"), None);
        // A fresh insert repopulates after expiry.
        cache.insert("groups", 8);
        assert_eq!(cache.get(&"groups"), Some(8));
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(300));
        cache.insert("groups", 7);
        cache.invalidate(&"groups");
        assert_eq!(cache.get(&"groups"), None);
    }
}
