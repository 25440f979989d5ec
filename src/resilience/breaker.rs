//! Per-key circuit breaker with time-based reset.

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, warn};

use super::ExpiringCache;
use crate::telemetry;

/// Configuration for a [`CircuitBreaker`].
///
/// ```rust
/// # use vendora::BreakerConfig;
/// # use std::time::Duration;
/// let config = BreakerConfig::new()
///     .threshold(5)
///     .reset_ttl(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive transport failures that open the circuit. Default: 3.
    pub threshold: u32,
    /// How long a failure count survives after its last increment. Default: 300s.
    pub reset_ttl: Duration,
    /// Maximum number of keys with a live failure count. Default: 500.
    pub max_keys: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            reset_ttl: Duration::from_secs(300),
            max_keys: 500,
        }
    }
}

impl BreakerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values below 1 are raised to 1.
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    pub fn reset_ttl(mut self, ttl: Duration) -> Self {
        self.reset_ttl = ttl;
        self
    }

    pub fn max_keys(mut self, max_keys: usize) -> Self {
        self.max_keys = max_keys;
        self
    }
}

/// Derived breaker state for one key. There is no half-open state: the
/// circuit closes when its failure count expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
}

/// Counts consecutive transport failures per key.
///
/// A key is open while its count is at or above the threshold. The count
/// expires `reset_ttl` after its most recent increment, which closes the
/// circuit again without any probe. Any success clears the count.
///
/// Only transport failures should be recorded here; see
/// [`resilient_call`](super::resilient_call).
pub struct CircuitBreaker<K: Hash + Eq> {
    name: &'static str,
    threshold: u32,
    failures: Mutex<ExpiringCache<K, u32>>,
}

impl<K> CircuitBreaker<K>
where
    K: Hash + Eq + Clone + Display,
{
    pub fn new(name: &'static str, config: BreakerConfig) -> Self {
        Self {
            name,
            threshold: config.threshold.max(1),
            failures: Mutex::new(ExpiringCache::new(config.max_keys, config.reset_ttl)),
        }
    }

    fn failures(&self) -> std::sync::MutexGuard<'_, ExpiringCache<K, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether calls for `key` should be rejected. Does not modify state.
    pub fn is_open(&self, key: &K) -> bool {
        self.failure_count(key) >= self.threshold
    }

    pub fn state(&self, key: &K) -> CircuitState {
        if self.is_open(key) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Live failure count for `key` (0 when absent or expired).
    pub fn failure_count(&self, key: &K) -> u32 {
        self.failures().peek(key).copied().unwrap_or(0)
    }

    /// Count one transport failure and restart the reset window.
    ///
    /// Returns the new count.
    pub fn record_failure(&self, key: &K) -> u32 {
        let count = {
            let mut failures = self.failures();
            let count = failures.get(key).unwrap_or(0).saturating_add(1);
            failures.insert(key.clone(), count);
            count
        };

        if count == self.threshold {
            warn!(
                breaker = self.name,
                key = %key,
                failures = count,
                threshold = self.threshold,
                "circuit opened"
            );
            metrics::counter!(telemetry::CIRCUIT_TRIPS_TOTAL, "breaker" => self.name)
                .increment(1);
        } else {
            debug!(
                breaker = self.name,
                key = %key,
                failures = count,
                threshold = self.threshold,
                "transport failure recorded"
            );
        }
        count
    }

    /// Clear the failure count for `key`, closing its circuit.
    pub fn record_success(&self, key: &K) {
        if self.failures().remove(key).is_some() {
            debug!(breaker = self.name, key = %key, "failure count reset");
        }
    }

    /// Whether any tracked key is currently open.
    pub fn any_open(&self) -> bool {
        self.failures()
            .live_values()
            .any(|&count| count >= self.threshold)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl<K: Hash + Eq> Debug for CircuitBreaker<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker<u64> {
        CircuitBreaker::new("test", BreakerConfig::default())
    }

    #[test]
    fn opens_exactly_at_threshold() {
        let cb = breaker();
        assert_eq!(cb.record_failure(&1), 1);
        assert_eq!(cb.record_failure(&1), 2);
        assert!(!cb.is_open(&1));
        assert_eq!(cb.record_failure(&1), 3);
        assert!(cb.is_open(&1));
        assert_eq!(cb.state(&1), CircuitState::Open);
    }

    #[test]
    fn success_resets_count() {
        let cb = breaker();
        cb.record_failure(&1);
        cb.record_failure(&1);
        cb.record_success(&1);
        assert_eq!(cb.failure_count(&1), 0);
        cb.record_failure(&1);
        assert!(!cb.is_open(&1));
    }

    #[test]
    fn keys_are_independent() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure(&1);
        }
        assert!(cb.is_open(&1));
        assert!(!cb.is_open(&2));
        assert!(cb.any_open());
    }

    #[test]
    fn threshold_is_at_least_one() {
        let cb: CircuitBreaker<u64> =
            CircuitBreaker::new("zero", BreakerConfig::new().threshold(0));
        assert_eq!(cb.threshold(), 1);
        cb.record_failure(&9);
        assert!(cb.is_open(&9));
    }

    #[tokio::test(start_paused = true)]
    async fn each_failure_restarts_window() {
        let cb = CircuitBreaker::new(
            "window",
            BreakerConfig::new().reset_ttl(Duration::from_secs(10)),
        );
        cb.record_failure(&"k");
        tokio::time::advance(Duration::from_secs(8)).await;
        cb.record_failure(&"k");
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cb.failure_count(&"k"), 2);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(cb.failure_count(&"k"), 0);
    }
}
