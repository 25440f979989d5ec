//! Circuit breaker and resilient call properties.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use vendora::error::TransportError;
use vendora::resilience::CircuitState;
use vendora::{BreakerConfig, CircuitBreaker, Outcome, VendoraError, resilient_call};

fn breaker(threshold: u32) -> CircuitBreaker<u64> {
    CircuitBreaker::new(
        "test_api",
        BreakerConfig::new()
            .threshold(threshold)
            .reset_ttl(Duration::from_secs(300)),
    )
}

async fn transport_failure(breaker: &CircuitBreaker<u64>, key: u64) -> vendora::Result<()> {
    resilient_call(breaker, &key, "test", || async {
        Outcome::<()>::TransportFailure(TransportError::Timeout)
    })
    .await
}

#[tokio::test(start_paused = true)]
async fn scenario_three_transport_failures_open_then_auto_reset() {
    let breaker = breaker(3);
    for _ in 0..3 {
        let err = transport_failure(&breaker, 42).await.unwrap_err();
        assert!(matches!(err, VendoraError::Transport(TransportError::Timeout)));
    }
    assert!(breaker.is_open(&42));

    let invoked = AtomicUsize::new(0);
    let err = resilient_call(&breaker, &42, "test", || async {
        invoked.fetch_add(1, Ordering::SeqCst);
        Outcome::Success(())
    })
    .await
    .unwrap_err();
    assert!(matches!(err, VendoraError::CircuitOpen { ref key, .. } if key == "42"));
    assert_eq!(invoked.load(Ordering::SeqCst), 0, "delegate must not run");

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(!breaker.is_open(&42));
    assert_eq!(breaker.state(&42), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn opens_at_threshold_not_before() {
    let breaker = breaker(5);
    for _ in 0..4 {
        let _ = transport_failure(&breaker, 1).await;
    }
    assert!(!breaker.is_open(&1));
    let _ = transport_failure(&breaker, 1).await;
    assert!(breaker.is_open(&1));
}

#[tokio::test(start_paused = true)]
async fn success_resets_one_short_of_threshold() {
    let breaker = breaker(3);
    let _ = transport_failure(&breaker, 7).await;
    let _ = transport_failure(&breaker, 7).await;
    assert_eq!(breaker.failure_count(&7), 2);

    resilient_call(&breaker, &7, "test", || async { Outcome::Success(()) })
        .await
        .unwrap();
    assert_eq!(breaker.failure_count(&7), 0);

    let _ = transport_failure(&breaker, 7).await;
    assert!(!breaker.is_open(&7));
}

#[tokio::test(start_paused = true)]
async fn business_failure_never_touches_the_breaker() {
    let breaker = breaker(1);
    let _ = transport_failure(&breaker, 9).await;
    breaker.record_success(&9);

    for _ in 0..10 {
        let err = resilient_call(&breaker, &9, "test", || async {
            Outcome::<()>::BusinessFailure("product not found".into())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, VendoraError::Business(ref m) if m == "product not found"));
    }
    assert_eq!(breaker.failure_count(&9), 0);
    assert!(!breaker.is_open(&9));
}

#[tokio::test(start_paused = true)]
async fn business_failure_keeps_existing_count() {
    let breaker = breaker(3);
    let _ = transport_failure(&breaker, 3).await;
    let _ = resilient_call(&breaker, &3, "test", || async {
        Outcome::<()>::BusinessFailure("rejected".into())
    })
    .await;
    assert_eq!(breaker.failure_count(&3), 1);
}

#[tokio::test(start_paused = true)]
async fn http_status_failures_do_not_count() {
    let breaker = breaker(1);
    let err = resilient_call(&breaker, &5, "test", || async {
        Outcome::<()>::Failed(VendoraError::Api {
            status: 500,
            message: "boom".into(),
        })
    })
    .await
    .unwrap_err();
    assert!(matches!(err, VendoraError::Api { status: 500, .. }));
    assert!(!breaker.is_open(&5));
}

#[tokio::test(start_paused = true)]
async fn any_open_tracks_every_key() {
    let breaker = breaker(2);
    assert!(!breaker.any_open());
    let _ = transport_failure(&breaker, 10).await;
    let _ = transport_failure(&breaker, 11).await;
    assert!(!breaker.any_open());
    let _ = transport_failure(&breaker, 11).await;
    assert!(breaker.any_open());
    assert!(!breaker.is_open(&10));

    tokio::time::advance(Duration::from_secs(301)).await;
    assert!(!breaker.any_open());
}
