//! Get-or-build cache that runs at most one build per key at a time.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use super::{ExpiringCache, KeyedLock};
use crate::telemetry;
use crate::{Result, VendoraError};

/// Configuration for a [`SingleflightCache`].
///
/// ```rust
/// # use vendora::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(2_000)
///     .ttl(Duration::from_secs(900));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached values. Default: 500.
    pub max_entries: usize,
    /// Time-to-live for each value. Default: 1 hour.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Lock registry sweep watermark: one and a half times the entry bound.
    pub(crate) fn sweep_threshold(&self) -> usize {
        self.max_entries.saturating_add(self.max_entries / 2).max(1)
    }
}

/// Expiring cache whose misses are collapsed into a single build per key.
///
/// Lookup order:
///
/// 1. Cached value: returned without locking.
/// 2. Otherwise the key's lock is taken and the cache is checked again, so
///    callers that queued behind a build reuse its result.
/// 3. Otherwise the builder runs and a successful value is cached.
///
/// The build runs on its own task and owns the key lock. A caller that is
/// cancelled mid-build does not cancel it: the build finishes, populates the
/// cache, and only then releases the key.
///
/// Failures are not cached. A queued caller that finds the cache still empty
/// after a failed build runs its own build.
pub struct SingleflightCache<K: Hash + Eq, V> {
    name: &'static str,
    entries: Arc<Mutex<ExpiringCache<K, V>>>,
    locks: KeyedLock<K>,
}

impl<K, V> SingleflightCache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            entries: Arc::new(Mutex::new(ExpiringCache::new(
                config.max_entries,
                config.ttl,
            ))),
            locks: KeyedLock::new(name, config.sweep_threshold()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, ExpiringCache<K, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lookup(&self, key: &K) -> Option<V> {
        self.entries().get(key)
    }

    fn record(&self, result: &'static str) {
        metrics::counter!(telemetry::CACHE_LOOKUPS_TOTAL,
            "cache" => self.name,
            "result" => result,
        )
        .increment(1);
    }

    /// Cached value for `key`, counting a hit when present.
    ///
    /// Never locks a key or builds. Absence is not counted as a miss; that
    /// is left to [`get_or_build`](Self::get_or_build).
    pub fn cached(&self, key: &K) -> Option<V> {
        let value = self.lookup(key)?;
        self.record(telemetry::RESULT_HIT);
        debug!(cache = self.name, ?key, "cache hit");
        Some(value)
    }

    /// Return the cached value for `key`, building it at most once concurrently.
    pub async fn get_or_build<F, Fut>(&self, key: K, build: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(value) = self.cached(&key) {
            return Ok(value);
        }

        let guard = self.locks.acquire(&key).await;

        if let Some(value) = self.lookup(&key) {
            self.record(telemetry::RESULT_HIT);
            debug!(cache = self.name, ?key, "cache hit after wait");
            return Ok(value);
        }

        self.record(telemetry::RESULT_MISS);
        debug!(cache = self.name, ?key, "cache miss, building");

        let entries = Arc::clone(&self.entries);
        let name = self.name;
        let fut = build();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let value = fut.await?;
            entries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key, value.clone());
            Ok::<_, VendoraError>(value)
        });

        match task.await {
            Ok(result) => {
                if let Err(e) = &result {
                    debug!(cache = name, error = %e, "build failed, not cached");
                }
                result
            }
            Err(join_err) => {
                warn!(cache = name, error = %join_err, "build task aborted");
                Err(VendoraError::Internal(format!("{name} build task failed: {join_err}")))
            }
        }
    }

    /// Whether a live value is cached for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.entries().contains(key)
    }

    /// Drop the cached value for `key`, if any.
    pub fn invalidate(&self, key: &K) {
        self.entries().remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<K: Hash + Eq, V> Debug for SingleflightCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleflightCache")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let cache = SingleflightCache::new("unit", CacheConfig::default());
        let calls = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let value = cache
                .get_or_build(1u64, move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("built".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "built");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let cache: SingleflightCache<u64, String> =
            SingleflightCache::new("unit", CacheConfig::default());

        let err = cache
            .get_or_build(1, || async { Err(VendoraError::Business("nope".into())) })
            .await
            .unwrap_err();
        assert!(matches!(err, VendoraError::Business(_)));
        assert!(!cache.contains(&1));

        let ok = cache
            .get_or_build(1, || async { Ok("second".to_string()) })
            .await
            .unwrap();
        assert_eq!(ok, "second");
    }

    #[tokio::test]
    async fn panicking_build_becomes_internal_error() {
        let cache: SingleflightCache<u64, u32> =
            SingleflightCache::new("unit", CacheConfig::default());
        let err = cache
            .get_or_build(1, || async {
                let blow_up = true;
                if blow_up {
                    panic!("builder blew up");
                }
                Ok(0)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, VendoraError::Internal(_)));

        // key lock must have been released with the task
        let ok = cache.get_or_build(1, || async { Ok(5) }).await.unwrap();
        assert_eq!(ok, 5);
    }

    #[test]
    fn sweep_threshold_is_one_and_a_half_times_capacity() {
        assert_eq!(CacheConfig::new().max_entries(500).sweep_threshold(), 750);
        assert_eq!(CacheConfig::new().max_entries(0).sweep_threshold(), 1);
    }
}
