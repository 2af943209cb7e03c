//! In-process TTL cache for provider lookups.
//!
//! Entries are never evicted on expiry alone: an expired entry is reported as
//! stale so callers that have a fallback path can still serve it.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<V> {
    Fresh(V),
    Stale(V),
    Missing,
}

impl<V> CacheLookup<V> {
    pub fn fresh(self) -> Option<V> {
        match self {
            CacheLookup::Fresh(v) => Some(v),
            _ => None,
        }
    }

    /// Fresh or stale value, whichever is present
    pub fn any(self) -> Option<V> {
        match self {
            CacheLookup::Fresh(v) | CacheLookup::Stale(v) => Some(v),
            CacheLookup::Missing => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

#[derive(Debug, Clone)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    store: Arc<DashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            store: Arc::new(DashMap::new()),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn get(&self, key: &K) -> CacheLookup<V> {
        match self.store.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                CacheLookup::Fresh(entry.value.clone())
            }
            Some(entry) => CacheLookup::Stale(entry.value.clone()),
            None => CacheLookup::Missing,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        if self.store.len() >= self.max_entries && !self.store.contains_key(&key) {
            self.evict_expired();
            if self.store.len() >= self.max_entries {
                // still full: drop an arbitrary entry
                let victim = self.store.iter().next().map(|e| e.key().clone());
                if let Some(victim) = victim {
                    self.store.remove(&victim);
                }
            }
        }
        self.store.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn remove(&self, key: &K) {
        self.store.remove(key);
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    fn evict_expired(&self) {
        let now = Instant::now();
        self.store.retain(|_, entry| entry.expires_at > now);
    }
}
