//! Per-session turn serialisation.

use std::future::Future;

use tokio::time::Instant;
use tracing::debug;

use super::KeyedLock;
use crate::types::SessionId;

/// Default registry size at which idle session locks are swept.
pub const DEFAULT_SESSION_SWEEP_THRESHOLD: usize = 1_500;

/// Linearises turns of the same conversation.
///
/// The conversation store is not safe for two concurrent turns on one
/// session; distinct sessions run fully in parallel.
#[derive(Debug)]
pub struct SessionSerializer {
    locks: KeyedLock<SessionId>,
}

impl Default for SessionSerializer {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_SWEEP_THRESHOLD)
    }
}

impl SessionSerializer {
    pub fn new(sweep_threshold: usize) -> Self {
        Self {
            locks: KeyedLock::new("sessions", sweep_threshold),
        }
    }

    /// Run `turn` once no other turn for `session` is in progress.
    pub async fn with_session_lock<F, Fut, T>(&self, session: SessionId, turn: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let waiting_since = Instant::now();
        let _guard = self.locks.acquire(&session).await;
        let waited = waiting_since.elapsed();
        if !waited.is_zero() {
            debug!(
                session,
                waited_ms = waited.as_millis() as u64,
                "session lock acquired after wait"
            );
        }
        turn().await
    }

    /// Number of session locks currently registered.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn is_busy(&self, session: SessionId) -> bool {
        self.locks.is_held(&session)
    }
}
