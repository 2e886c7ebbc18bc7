//! In-process TTL cache with tenant-partitioned invalidation.
//!
//! Caches are explicit services injected into components, never ambient
//! global state. Correctness does not depend on them: a miss falls through to
//! the store, and the evaluation path fails closed on lookup errors.

use lru::LruCache;
use metrics::counter;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// LRU cache where entries expire after a fixed TTL.
pub struct TtlCache<K: Hash + Eq + Clone, V: Clone> {
    name: &'static str,
    inner: Mutex<LruCache<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> TtlCache<K, V> {
    pub fn new(name: &'static str, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            name,
            inner: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Fetch a live entry; expired entries are dropped on access.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        match cache.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                counter!("trustgate_cache_hits_total", "cache" => self.name).increment(1);
                Some(entry.value.clone())
            }
            Some(_) => {
                cache.pop(key);
                counter!("trustgate_cache_misses_total", "cache" => self.name).increment(1);
                None
            }
            None => {
                counter!("trustgate_cache_misses_total", "cache" => self.name).increment(1);
                None
            }
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        cache.put(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop a single partition.
    pub fn invalidate(&self, key: &K) {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        cache.pop(key);
    }

    /// Drop every partition matching the predicate. Used for tenant-scoped
    /// invalidation, e.g. all keys under one group.
    pub fn invalidate_where(&self, predicate: impl Fn(&K) -> bool) {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        let doomed: Vec<K> = cache
            .iter()
            .filter(|(key, _)| predicate(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            cache.pop(&key);
        }
    }

    pub fn clear(&self) {
        let mut cache = self.inner.lock().expect("cache lock poisoned");
        cache.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
