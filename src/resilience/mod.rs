//! Caching and failure-isolation primitives.
//!
//! - [`ExpiringCache`]: size-bounded LRU map with absolute per-entry expiry
//! - [`KeyedLock`]: one async mutex per key, swept once the registry grows
//! - [`CircuitBreaker`]: per-key transport failure counter with TTL reset
//! - [`resilient_call`]: runs an upstream call behind a breaker
//! - [`SingleflightCache`]: get-or-build with one concurrent build per key
//! - [`SessionSerializer`]: per-conversation turn ordering
//! - [`with_retry`]: backoff for idempotent reads

mod breaker;
mod call;
mod expiring;
mod keyed_lock;
mod retry;
mod session;
mod singleflight;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use call::{Outcome, resilient_call};
pub use expiring::ExpiringCache;
pub use keyed_lock::{KeyGuard, KeyedLock};
pub use retry::{RetryConfig, with_retry};
pub use session::{DEFAULT_SESSION_SWEEP_THRESHOLD, SessionSerializer};
pub use singleflight::{CacheConfig, SingleflightCache};
