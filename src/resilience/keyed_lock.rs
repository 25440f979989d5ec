//! Per-key async mutual exclusion with a bounded registry.

use std::collections::HashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

type Handle = Arc<tokio::sync::Mutex<()>>;

/// Exclusive hold on one key of a [`KeyedLock`].
///
/// Dropping the guard releases the key, including when the holding future
/// is cancelled.
#[derive(Debug)]
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Registry handing out one async mutex per key.
///
/// Handles are created on first use and kept in a map. Once the map grows past
/// `sweep_threshold` the next acquisition sweeps it, dropping every handle that
/// nobody holds or waits on. The key being acquired is never swept.
///
/// Locks for distinct keys never contend; the registry map itself is only
/// held for the duration of a lookup, never across an await.
pub struct KeyedLock<K> {
    name: &'static str,
    sweep_threshold: usize,
    handles: Mutex<HashMap<K, Handle>>,
}

impl<K> KeyedLock<K>
where
    K: Hash + Eq + Clone + Debug,
{
    pub fn new(name: &'static str, sweep_threshold: usize) -> Self {
        Self {
            name,
            sweep_threshold: sweep_threshold.max(1),
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn handle(&self, key: &K) -> Handle {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        if handles.len() > self.sweep_threshold {
            let before = handles.len();
            // strong_count > 1 means a guard or a pending acquire still owns a clone
            handles.retain(|k, h| k == key || Arc::strong_count(h) > 1);
            debug!(
                lock = self.name,
                before,
                after = handles.len(),
                "swept idle key locks"
            );
        }
        handles.entry(key.clone()).or_default().clone()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &K) -> KeyGuard {
        let handle = self.handle(key);
        KeyGuard {
            _guard: handle.lock_owned().await,
        }
    }

    /// Run `f` while holding `key`; the key is released on every exit path.
    pub async fn with_lock<F, Fut, T>(&self, key: &K, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.acquire(key).await;
        f().await
    }

    /// Number of handles currently registered.
    pub fn len(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether some caller currently holds `key`.
    pub fn is_held(&self, key: &K) -> bool {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|h| h.try_lock().is_err())
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<K> Debug for KeyedLock<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedLock")
            .field("name", &self.name)
            .field("sweep_threshold", &self.sweep_threshold)
            .finish_non_exhaustive()
    }
}
