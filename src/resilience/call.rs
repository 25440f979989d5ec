//! Breaker-guarded upstream calls and outcome classification.

use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;

use serde_json::Value;
use tracing::warn;

use super::CircuitBreaker;
use crate::error::TransportError;
use crate::telemetry;
use crate::{Result, VendoraError};

/// Classified result of one upstream operation.
///
/// The variant decides what a [`CircuitBreaker`] sees: only
/// `TransportFailure` counts against it.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    /// Upstream was reachable and reported that the operation failed.
    BusinessFailure(String),
    /// Upstream could not be reached or did not answer in time.
    TransportFailure(TransportError),
    /// Any other failure from a reachable upstream (HTTP status, bad body).
    Failed(VendoraError),
}

impl<T> Outcome<T> {
    /// Map the success value, keeping the classification.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::BusinessFailure(m) => Outcome::BusinessFailure(m),
            Outcome::TransportFailure(e) => Outcome::TransportFailure(e),
            Outcome::Failed(e) => Outcome::Failed(e),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(v) => Outcome::Success(v),
            Err(VendoraError::Transport(e)) => Outcome::TransportFailure(e),
            Err(VendoraError::Business(m)) => Outcome::BusinessFailure(m),
            Err(e) => Outcome::Failed(e),
        }
    }
}

impl Outcome<Value> {
    /// Classify a raw upstream envelope by its `success` flag.
    ///
    /// `{"success": false}` becomes a business failure carrying the upstream
    /// `error` or `message` text.
    pub fn from_envelope(result: Result<Value>) -> Self {
        match result {
            Ok(body) => {
                if body.get("success").and_then(Value::as_bool) == Some(true) {
                    Outcome::Success(body)
                } else {
                    Outcome::BusinessFailure(envelope_error(&body))
                }
            }
            Err(e) => Outcome::from(Err(e)),
        }
    }
}

fn envelope_error(body: &Value) -> String {
    ["error", "message"]
        .iter()
        .filter_map(|field| body.get(*field).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("unexpected upstream response")
        .to_owned()
}

/// Run `delegate` behind `breaker` for `key`.
///
/// 1. An open circuit fails with [`VendoraError::CircuitOpen`] and the
///    delegate is never invoked.
/// 2. `Success` clears the key's failure count.
/// 3. `TransportFailure` records a failure and is returned as
///    [`VendoraError::Transport`].
/// 4. `BusinessFailure` and `Failed` are returned without touching the
///    breaker.
pub async fn resilient_call<K, T, F, Fut>(
    breaker: &CircuitBreaker<K>,
    key: &K,
    service: &str,
    delegate: F,
) -> Result<T>
where
    K: Hash + Eq + Clone + Display,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    if breaker.is_open(key) {
        warn!(
            service,
            breaker = breaker.name(),
            key = %key,
            "circuit open, call rejected without network"
        );
        return Err(VendoraError::CircuitOpen {
            service: service.to_owned(),
            key: key.to_string(),
        });
    }

    let result = match delegate().await {
        Outcome::Success(value) => {
            breaker.record_success(key);
            Ok(value)
        }
        Outcome::TransportFailure(e) => {
            warn!(service, key = %key, error = %e, "transport failure");
            breaker.record_failure(key);
            Err(VendoraError::Transport(e))
        }
        Outcome::BusinessFailure(message) => Err(VendoraError::Business(message)),
        Outcome::Failed(e) => Err(e),
    };

    let status = if result.is_ok() { "success" } else { "error" };
    metrics::counter!(telemetry::RESILIENT_CALLS_TOTAL,
        "service" => service.to_owned(),
        "status" => status,
    )
    .increment(1);

    result
}
