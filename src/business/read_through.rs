//! Cached, breaker-guarded lookups that degrade to an empty string.

use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::resilience::{CacheConfig, CircuitBreaker, Outcome, SingleflightCache, resilient_call};
use crate::telemetry;
use crate::VendoraError;

/// One domain's read-through cache of formatted prompt text.
///
/// A lookup is served from cache, rejected early when the key's circuit is
/// open, or fetched once through [`resilient_call`] and formatted. Every
/// failure becomes `""`: this data only enriches a prompt, so its absence
/// must never fail a turn. Failures are not cached; an empty but successful
/// result is.
pub struct ReadThrough<K: Hash + Eq> {
    domain: &'static str,
    cache: SingleflightCache<K, String>,
    breaker: Arc<CircuitBreaker<K>>,
}

impl<K> ReadThrough<K>
where
    K: Hash + Eq + Clone + Debug + Display + Send + Sync + 'static,
{
    pub fn new(domain: &'static str, config: CacheConfig, breaker: Arc<CircuitBreaker<K>>) -> Self {
        Self {
            domain,
            cache: SingleflightCache::new(domain, config),
            breaker,
        }
    }

    /// Formatted text for `key`, or `""` when it cannot be obtained.
    pub async fn read<F, Fut>(&self, key: K, fetch: F, format: fn(&Value) -> String) -> String
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<Value>> + Send + 'static,
    {
        if let Some(text) = self.cache.cached(&key) {
            return text;
        }

        if self.breaker.is_open(&key) {
            self.record_circuit_open();
            debug!(domain = self.domain, key = %key, "circuit open, using fallback");
            return String::new();
        }

        let breaker = Arc::clone(&self.breaker);
        let domain = self.domain;
        let call_key = key.clone();
        let built = self
            .cache
            .get_or_build(key.clone(), move || {
                let request = fetch();
                async move {
                    let body = resilient_call(&breaker, &call_key, domain, || request).await?;
                    Ok(format(&body))
                }
            })
            .await;

        match built {
            Ok(text) => text,
            // Opened while this caller was queued behind another build.
            Err(VendoraError::CircuitOpen { .. }) => {
                self.record_circuit_open();
                debug!(domain, key = %key, "circuit opened while waiting, using fallback");
                String::new()
            }
            Err(e) => {
                warn!(domain, key = %key, kind = e.kind(), error = %e, "lookup failed, using fallback");
                String::new()
            }
        }
    }

    fn record_circuit_open(&self) {
        metrics::counter!(telemetry::CACHE_LOOKUPS_TOTAL,
            "cache" => self.domain,
            "result" => telemetry::RESULT_CIRCUIT_OPEN,
        )
        .increment(1);
    }

    pub fn is_cached(&self, key: &K) -> bool {
        self.cache.contains(key)
    }

    pub fn invalidate(&self, key: &K) {
        self.cache.invalidate(key);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn domain(&self) -> &'static str {
        self.domain
    }
}

impl<K: Hash + Eq> Debug for ReadThrough<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThrough")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}
