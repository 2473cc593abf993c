/// Per-subject, time-boxed memoization of a read query
///
/// Entries older than the TTL read as absent. They are not swept; the next
/// `set` for that subject overwrites them. Writers call `invalidate` after
/// every successful mutation, before responding, so a request that starts
/// after the response never sees the pre-write result.

use dashmap::DashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    data: V,
    written_at: Instant,
}

pub struct ReadCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> ReadCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached data for `key` if it was written less than one TTL ago
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.written_at.elapsed() < self.ttl {
            Some(entry.data.clone())
        } else {
            None
        }
    }

    /// Replace any prior entry for `key` with a freshly timestamped one
    pub fn set(&self, key: K, data: V) {
        self.entries.insert(
            key,
            CacheEntry {
                data,
                written_at: Instant::now(),
            },
        );
    }

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Number of stored entries, stale ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_get_returns_recent_data() {
        let cache = ReadCache::new(Duration::from_secs(30));
        cache.set(1_i64, vec!["write docs"]);

        assert_eq!(cache.get(&1), Some(vec!["write docs"]));
        assert_eq!(cache.get(&2), None);
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = ReadCache::new(Duration::from_millis(20));
        cache.set(1_i64, 10);
        sleep(Duration::from_millis(40));

        assert_eq!(cache.get(&1), None);
        // Stale entries stay stored until overwritten.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_restarts_the_clock() {
        let cache = ReadCache::new(Duration::from_millis(30));
        cache.set(1_i64, 10);
        sleep(Duration::from_millis(40));
        cache.set(1_i64, 11);

        assert_eq!(cache.get(&1), Some(11));
    }

    #[test]
    fn test_invalidate_is_immediate() {
        let cache = ReadCache::new(Duration::from_secs(30));
        cache.set(1_i64, 10);
        cache.set(2_i64, 20);

        cache.invalidate(&1);

        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(20));
    }

    #[test]
    fn test_clear() {
        let cache = ReadCache::new(Duration::from_secs(30));
        cache.set(1_i64, 10);
        cache.clear();
        assert!(cache.is_empty());
    }
}
