//! Singleflight cache behaviour under concurrent callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use vendora::resilience::ExpiringCache;
use vendora::{CacheConfig, SingleflightCache, VendoraError};

fn cache(ttl: Duration) -> Arc<SingleflightCache<String, String>> {
    Arc::new(SingleflightCache::new(
        "test",
        CacheConfig::new().max_entries(10).ttl(ttl),
    ))
}

#[tokio::test(start_paused = true)]
async fn two_concurrent_misses_build_once() {
    let cache = cache(Duration::from_secs(3600));
    let builds = Arc::new(AtomicUsize::new(0));

    let call = |cache: Arc<SingleflightCache<String, String>>, builds: Arc<AtomicUsize>| async move {
        cache
            .get_or_build("tenantA".to_string(), move || async move {
                builds.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok("AGENT_A".to_string())
            })
            .await
    };

    let (a, b) = tokio::join!(
        call(cache.clone(), builds.clone()),
        call(cache.clone(), builds.clone())
    );
    assert_eq!(a.unwrap(), "AGENT_A");
    assert_eq!(b.unwrap(), "AGENT_A");
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn many_concurrent_callers_share_one_build() {
    for n in [1usize, 2, 8, 64] {
        let cache = cache(Duration::from_secs(3600));
        let builds = Arc::new(AtomicUsize::new(0));

        let callers = (0..n).map(|i| {
            let cache = cache.clone();
            let builds = builds.clone();
            tokio::spawn(async move {
                cache
                    .get_or_build("k".to_string(), move || async move {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(format!("built by {i}"))
                    })
                    .await
            })
        });
        let results: Vec<String> = join_all(callers)
            .await
            .into_iter()
            .map(|r| r.unwrap().unwrap())
            .collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1, "n = {n}");
        assert!(results.windows(2).all(|w| w[0] == w[1]), "n = {n}");
    }
}

#[tokio::test(start_paused = true)]
async fn failed_build_is_retried_by_the_next_waiter() {
    let cache = cache(Duration::from_secs(3600));
    let builds = Arc::new(AtomicUsize::new(0));

    let callers = (0..3).map(|_| {
        let cache = cache.clone();
        let builds = builds.clone();
        tokio::spawn(async move {
            cache
                .get_or_build("k".to_string(), move || async move {
                    let attempt = builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    if attempt == 0 {
                        Err(VendoraError::Business("not yet".into()))
                    } else {
                        Ok("second".to_string())
                    }
                })
                .await
        })
    });
    let results: Vec<_> = join_all(callers)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    // One caller saw the failure, one rebuilt, the last reused that value.
    assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
    assert_eq!(
        results.iter().filter(|r| r.as_deref().ok() == Some("second")).count(),
        2
    );
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelled_caller_does_not_cancel_the_build() {
    let cache = cache(Duration::from_secs(3600));
    let builds = Arc::new(AtomicUsize::new(0));

    let first = {
        let cache = cache.clone();
        let builds = builds.clone();
        tokio::spawn(async move {
            cache
                .get_or_build("k".to_string(), move || async move {
                    builds.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok("done".to_string())
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    // The orphaned build still lands in the cache.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(cache.contains(&"k".to_string()));

    let value = cache
        .get_or_build("k".to_string(), || async { Ok("rebuilt".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "done");
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn value_expires_after_ttl() {
    let cache = cache(Duration::from_secs(60));
    cache
        .get_or_build("k".to_string(), || async { Ok("v1".to_string()) })
        .await
        .unwrap();

    tokio::time::advance(Duration::from_millis(59_999)).await;
    assert_eq!(cache.cached(&"k".to_string()).as_deref(), Some("v1"));

    tokio::time::advance(Duration::from_millis(2)).await;
    assert!(cache.cached(&"k".to_string()).is_none());

    let value = cache
        .get_or_build("k".to_string(), || async { Ok("v2".to_string()) })
        .await
        .unwrap();
    assert_eq!(value, "v2");
}

#[test]
fn oldest_entry_evicted_at_capacity() {
    let mut cache = ExpiringCache::new(2, Duration::from_secs(60));
    cache.insert("K1", 1);
    cache.insert("K2", 2);
    cache.insert("K3", 3);

    assert!(!cache.contains(&"K1"));
    assert!(cache.contains(&"K2"));
    assert!(cache.contains(&"K3"));
    assert_eq!(cache.len(), 2);
}
