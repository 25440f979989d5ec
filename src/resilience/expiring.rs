//! Size-bounded map with absolute per-entry expiry.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> Entry<V> {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Map from key to value where every entry carries an absolute expiry.
///
/// An entry is visible only while `now < inserted_at + ttl`. Expired entries
/// are treated as absent and removed lazily on access.
///
/// Capacity is a hard bound. Inserting a new key into a full cache first
/// drops every expired entry; if the cache is still full the least recently
/// used entry is evicted. Reads through [`get`](Self::get) count as use;
/// [`peek`](Self::peek) does not.
///
/// Time is read from `tokio::time::Instant`, so a paused test runtime
/// controls expiry.
///
/// Not synchronised. Wrap it in a mutex or use
/// [`SingleflightCache`](super::SingleflightCache) for shared access.
#[derive(Debug)]
pub struct ExpiringCache<K: Hash + Eq, V> {
    entries: LruCache<K, Entry<V>>,
    ttl: Duration,
}

impl<K: Hash + Eq + Clone, V: Clone> ExpiringCache<K, V> {
    /// A `max_entries` of zero is treated as one.
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Look up a live value and mark it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        let live = self.entries.peek(key).map(|e| e.is_live(now))?;
        if !live {
            self.entries.pop(key);
            return None;
        }
        self.entries.get(key).map(|e| e.value.clone())
    }

    /// Look up a live value without touching recency or evicting.
    pub fn peek(&self, key: &K) -> Option<&V> {
        let now = Instant::now();
        self.entries
            .peek(key)
            .filter(|e| e.is_live(now))
            .map(|e| &e.value)
    }

    pub fn contains(&mut self, key: &K) -> bool {
        let now = Instant::now();
        match self.entries.peek(key) {
            Some(entry) if entry.is_live(now) => true,
            Some(_) => {
                self.entries.pop(key);
                false
            }
            None => false,
        }
    }

    /// Insert or overwrite `key`; its expiry restarts at `now + ttl`.
    pub fn insert(&mut self, key: K, value: V) {
        if !self.entries.contains(&key) && self.entries.len() >= self.entries.cap().get() {
            self.purge_expired();
        }
        let expires_at = Instant::now() + self.ttl;
        self.entries.put(key, Entry { value, expires_at });
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.entries
            .pop(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value)
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| !e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        expired.len()
    }

    /// Live values, most recently used first.
    pub fn live_values(&self) -> impl Iterator<Item = &V> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(move |(_, e)| e.is_live(now))
            .map(|(_, e)| &e.value)
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
