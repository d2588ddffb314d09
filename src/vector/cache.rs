// Embedding cache: LRU with TTL, keyed by `(entity name, FNV-1a hash of
// the text that was embedded)` so a content change invalidates the cache
// entry even if the name is unchanged (spec 4.5.3). Extends the teacher's
// hand-rolled `LruCache` (wrappers.rs) with expiry, rather than pulling in
// a crate for something the teacher already shows how to build in-house.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::hash::fnv1a;

#[derive(Clone, Eq, PartialEq, Hash)]
struct CacheKey {
    name: String,
    content_hash: u64,
}

struct Entry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

/// Hit/miss counters and a byte-usage estimate, for observability (spec
/// 4.9: "tracks hits/misses ... reports approximate byte usage").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub approx_bytes: usize,
}

pub struct EmbeddingCache {
    capacity: usize,
    ttl: Duration,
    map: HashMap<CacheKey, Entry>,
    access_order: Vec<CacheKey>,
    hits: u64,
    misses: u64,
}

impl EmbeddingCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            map: HashMap::with_capacity(capacity),
            access_order: Vec::with_capacity(capacity),
            hits: 0,
            misses: 0,
        }
    }

    fn key(name: &str, text: &str) -> CacheKey {
        CacheKey {
            name: name.to_string(),
            content_hash: fnv1a(text),
        }
    }

    /// Returns the cached vector for `(name, text)` unless absent or
    /// expired; an expired hit is evicted rather than silently reused.
    pub fn get(&mut self, name: &str, text: &str) -> Option<Vec<f32>> {
        let key = Self::key(name, text);
        let expired = self
            .map
            .get(&key)
            .map(|entry| entry.inserted_at.elapsed() > self.ttl)
            .unwrap_or(false);

        if expired {
            self.remove(&key);
            self.misses += 1;
            return None;
        }

        if self.map.contains_key(&key) {
            self.access_order.retain(|k| k != &key);
            self.access_order.push(key.clone());
            self.hits += 1;
            self.map.get(&key).map(|e| e.vector.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn put(&mut self, name: &str, text: &str, vector: Vec<f32>) {
        let key = Self::key(name, text);
        if self.map.len() >= self.capacity && !self.map.contains_key(&key) {
            if !self.access_order.is_empty() {
                let lru = self.access_order.remove(0);
                self.map.remove(&lru);
            }
        }
        self.map.insert(
            key.clone(),
            Entry {
                vector,
                inserted_at: Instant::now(),
            },
        );
        self.access_order.retain(|k| k != &key);
        self.access_order.push(key);
    }

    /// Drops every cached entry for `name`, regardless of content hash -
    /// used when an entity is deleted.
    pub fn invalidate_name(&mut self, name: &str) {
        let keys: Vec<CacheKey> = self
            .map
            .keys()
            .filter(|k| k.name == name)
            .cloned()
            .collect();
        for key in keys {
            self.remove(&key);
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        self.map.remove(key);
        self.access_order.retain(|k| k != key);
    }

    /// Evicts every entry past its TTL without waiting for a `get` to find
    /// it expired. Returns the number of entries removed.
    pub fn prune_expired(&mut self) -> usize {
        let expired: Vec<CacheKey> = self
            .map
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() > self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        let count = expired.len();
        for key in expired {
            self.remove(&key);
        }
        count
    }

    /// Hit/miss counters plus an approximate byte footprint (4 bytes per
    /// `f32` component, ignoring map/string overhead - good enough for an
    /// observability dashboard, not for capacity planning).
    pub fn stats(&self) -> CacheStats {
        let approx_bytes = self
            .map
            .values()
            .map(|entry| entry.vector.len() * std::mem::size_of::<f32>())
            .sum();
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.map.len(),
            approx_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_by_name_and_content_hash() {
        let mut cache = EmbeddingCache::new(4, Duration::from_secs(60));
        cache.put("Alice", "bio text", vec![0.1, 0.2]);
        assert_eq!(cache.get("Alice", "bio text"), Some(vec![0.1, 0.2]));
        assert_eq!(cache.get("Alice", "different text"), None);
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let mut cache = EmbeddingCache::new(4, Duration::from_millis(1));
        cache.put("Alice", "bio", vec![0.1]);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("Alice", "bio"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn evicts_least_recently_used_when_full() {
        let mut cache = EmbeddingCache::new(2, Duration::from_secs(60));
        cache.put("A", "a", vec![1.0]);
        cache.put("B", "b", vec![2.0]);
        cache.get("A", "a");
        cache.put("C", "c", vec![3.0]);
        assert_eq!(cache.get("B", "b"), None);
        assert_eq!(cache.get("A", "a"), Some(vec![1.0]));
    }

    #[test]
    fn invalidate_name_drops_all_hashes_for_that_name() {
        let mut cache = EmbeddingCache::new(4, Duration::from_secs(60));
        cache.put("Alice", "bio v1", vec![0.1]);
        cache.invalidate_name("Alice");
        assert_eq!(cache.get("Alice", "bio v1"), None);
    }

    #[test]
    fn tracks_hit_and_miss_counts() {
        let mut cache = EmbeddingCache::new(4, Duration::from_secs(60));
        cache.put("Alice", "bio", vec![0.1, 0.2]);
        cache.get("Alice", "bio");
        cache.get("Alice", "other text");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.approx_bytes, 2 * std::mem::size_of::<f32>());
    }

    #[test]
    fn prune_expired_removes_stale_entries_without_a_get() {
        let mut cache = EmbeddingCache::new(4, Duration::from_millis(1));
        cache.put("Alice", "bio", vec![0.1]);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.prune_expired(), 1);
        assert!(cache.is_empty());
    }
}
