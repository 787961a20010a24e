//! Query cache and polling behaviour on tokio's paused clock.
//!
//! Fetchers here are in-process futures with simulated latency, so the
//! clock can be advanced deterministically.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sentio_core::models::{Anomaly, AnomalyList};
use sentio_core::{ApiError, PollingScheduler, QueryCache, QueryOptions, QueryStatus};
use tokio::time::sleep;

/// A fetcher that takes `latency` and returns how many times it has run.
fn counter(
    calls: &Arc<AtomicUsize>,
    latency: Duration,
) -> impl Fn() -> futures::future::BoxFuture<'static, Result<usize, ApiError>> + Send + Sync + 'static {
    let calls = Arc::clone(calls);
    move || {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            sleep(latency).await;
            Ok(n)
        })
    }
}

fn anomaly(metric: &str, value: f64) -> Anomaly {
    serde_json::from_value(serde_json::json!({
        "timestamp": "2024-05-01T10:00:00Z",
        "value": value,
        "score": 0.9,
        "metric": metric
    }))
    .unwrap()
}

// ============================================================================
// Deduplication and ordering
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_concurrent_subscribers_share_one_fetch() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut subs: Vec<_> = (0..5)
        .map(|_| cache.subscribe("status", counter(&calls, Duration::from_millis(100)), QueryOptions::new()))
        .collect();

    for sub in &mut subs {
        let entry = sub.settled().await;
        assert_eq!(entry.status, QueryStatus::Success);
        assert_eq!(entry.data, Some(1));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.subscriber_count("status"), 5);
}

#[tokio::test(start_paused = true)]
async fn test_newest_fetch_wins() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch = {
        let calls = Arc::clone(&calls);
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            // The first fetch is the slow one
            let latency = if n == 1 { 100 } else { 10 };
            async move {
                sleep(Duration::from_millis(latency)).await;
                Ok::<_, ApiError>(format!("F{}", n))
            }
        }
    };

    let mut sub = cache.subscribe("devices", fetch, QueryOptions::new());
    sleep(Duration::from_millis(5)).await;
    assert!(cache.invalidate("devices"));

    let entry = sub.settled().await;
    assert_eq!(entry.data.as_deref(), Some("F2"));

    // Well past the point F1 would have resolved
    sleep(Duration::from_millis(500)).await;
    assert_eq!(sub.snapshot().data.as_deref(), Some("F2"));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_invalidate_then_read_refetches() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let latency = Duration::from_millis(10);

    let first = cache.fetch("alerts", counter(&calls, latency), QueryOptions::new()).await;
    let cached = cache.fetch("alerts", counter(&calls, latency), QueryOptions::new()).await;
    assert_eq!(first.data, Some(1));
    assert_eq!(cached.data, Some(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert!(cache.invalidate("alerts"));
    let fresh = cache.fetch("alerts", counter(&calls, latency), QueryOptions::new()).await;
    assert_eq!(fresh.data, Some(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_skipped_while_fetch_running() {
    use sentio_core::cache::Refresh;

    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let mut sub = cache.subscribe("predictions", counter(&calls, Duration::from_secs(5)), QueryOptions::new());

    sleep(Duration::from_secs(1)).await;
    assert!(cache.refresh("predictions"));
    assert!(cache.refresh("predictions"));

    sub.settled().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Refresh intervals
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresh_interval_keeps_data_visible() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions::new().refresh_every(Duration::from_secs(10));

    let mut sub = cache.subscribe("status", counter(&calls, Duration::from_secs(1)), options);
    sub.settled().await;

    let mut saw_loading = false;
    for _ in 0..110 {
        sleep(Duration::from_millis(500)).await;
        let entry = sub.snapshot();
        assert!(entry.data.is_some(), "data vanished during refresh");
        saw_loading |= entry.is_loading();
    }

    // Initial fetch plus one per elapsed interval
    assert_eq!(calls.load(Ordering::SeqCst), 6);
    assert!(saw_loading);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_interval_stops_with_last_subscriber() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions::new().refresh_every(Duration::from_secs(10));

    let mut sub = cache.subscribe("status", counter(&calls, Duration::from_millis(10)), options);
    sub.settled().await;
    drop(sub);

    sleep(Duration::from_secs(25)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.get_snapshot("status").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_interval_lengthens_when_short_subscriber_leaves() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let latency = Duration::from_millis(10);

    let mut slow = cache.subscribe(
        "status",
        counter(&calls, latency),
        QueryOptions::new().refresh_every(Duration::from_secs(60)),
    );
    let fast = cache.subscribe(
        "status",
        counter(&calls, latency),
        QueryOptions::new().refresh_every(Duration::from_secs(10)),
    );
    slow.settled().await;

    sleep(Duration::from_millis(10_500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Only the 60s subscriber is left
    drop(fast);
    sleep(Duration::from_secs(125)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(slow.snapshot().data, Some(4));
}

// ============================================================================
// Failures and placeholders
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_network_error_keeps_prior_payload() {
    let cache = QueryCache::new();
    let offline = Arc::new(AtomicBool::new(false));
    let prior = AnomalyList {
        anomalies: vec![anomaly("temperature", 98.5)],
    };

    let fetch = {
        let offline = Arc::clone(&offline);
        let prior = prior.clone();
        move || {
            let result = if offline.load(Ordering::SeqCst) {
                Err(ApiError::NetworkUnavailable("connection refused".into()))
            } else {
                Ok(prior.clone())
            };
            async move { result }
        }
    };

    let mut sub = cache.subscribe("anomalies", fetch, QueryOptions::new());
    assert_eq!(sub.settled().await.data.as_ref(), Some(&prior));

    offline.store(true, Ordering::SeqCst);
    sub.refetch();
    let entry = sub.settled().await;

    assert_eq!(entry.status, QueryStatus::Error);
    assert_eq!(entry.data.as_ref(), Some(&prior));
    assert!(entry.is_stale_with_error());
    assert!(matches!(entry.error, Some(ApiError::NetworkUnavailable(_))));

    // Recovery clears the error
    offline.store(false, Ordering::SeqCst);
    sub.refetch();
    let entry = sub.settled().await;
    assert_eq!(entry.status, QueryStatus::Success);
    assert!(entry.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_default_value_until_first_success() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let options = QueryOptions::new().default_value(0);

    let mut sub = cache.subscribe("devices", counter(&calls, Duration::from_secs(1)), options);
    let loading = sub.snapshot();
    assert!(loading.is_loading());
    assert!(loading.is_placeholder());
    assert_eq!(loading.value(), Some(&0));
    assert_eq!(loading.data, None);

    let entry = sub.settled().await;
    assert!(!entry.is_placeholder());
    assert_eq!(entry.value(), Some(&1));
}

#[tokio::test(start_paused = true)]
async fn test_first_failure_falls_back_to_default() {
    let cache: QueryCache<Vec<String>> = QueryCache::new();
    let options = QueryOptions::new().default_value(vec!["demo".to_string()]);
    let fetch = || async {
        Err::<Vec<String>, _>(ApiError::ServerError {
            status: 502,
            message: "Bad Gateway".into(),
        })
    };

    let mut sub = cache.subscribe("devices", fetch, options);
    let entry = sub.settled().await;
    assert_eq!(entry.status, QueryStatus::Error);
    assert_eq!(entry.data, None);
    assert_eq!(entry.value(), Some(&vec!["demo".to_string()]));
}

// ============================================================================
// Lifetime
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_evicted_after_grace_then_refetched() {
    let cache = QueryCache::with_grace(Duration::from_secs(30));
    let calls = Arc::new(AtomicUsize::new(0));
    let latency = Duration::from_millis(10);

    let mut sub = cache.subscribe("anomalies", counter(&calls, latency), QueryOptions::new());
    sub.settled().await;
    drop(sub);

    sleep(Duration::from_secs(29)).await;
    assert!(cache.get_snapshot("anomalies").is_some());

    // Coming back within the grace period reuses the entry
    let sub = cache.subscribe("anomalies", counter(&calls, latency), QueryOptions::new());
    assert_eq!(sub.snapshot().data, Some(1));
    drop(sub);

    sleep(Duration::from_secs(31)).await;
    assert!(cache.get_snapshot("anomalies").is_none());

    let mut sub = cache.subscribe("anomalies", counter(&calls, latency), QueryOptions::new());
    let fresh = sub.snapshot();
    assert!(fresh.is_loading());
    assert_eq!(fresh.data, None);
    assert_eq!(sub.settled().await.data, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_last_unsubscribe_cancels_fetch() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let sub = cache.subscribe("predictions", counter(&calls, Duration::from_secs(10)), QueryOptions::new());
    sleep(Duration::from_secs(1)).await;
    drop(sub);

    sleep(Duration::from_secs(15)).await;
    let entry = cache.get_snapshot("predictions").unwrap();
    assert_eq!(entry.status, QueryStatus::Idle);
    assert_eq!(entry.data, None);

    // The abandoned result was never applied, so a new subscriber fetches
    let mut sub = cache.subscribe("predictions", counter(&calls, Duration::from_secs(1)), QueryOptions::new());
    assert_eq!(sub.settled().await.data, Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_stream_yields_changes() {
    use futures::StreamExt;

    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let sub = cache.subscribe("status", counter(&calls, Duration::from_millis(10)), QueryOptions::new());

    let mut stream = Box::pin(sub.into_stream());
    let entry = stream.next().await.unwrap();
    assert_eq!(entry.status, QueryStatus::Success);
    assert_eq!(entry.data, Some(1));
}

// ============================================================================
// Polling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_slow_key_does_not_delay_other_timer() {
    let anomalies = QueryCache::new();
    let predictions = QueryCache::new();
    let anomaly_calls = Arc::new(AtomicUsize::new(0));
    let prediction_calls = Arc::new(AtomicUsize::new(0));

    // Keep both keys observed for the whole run
    let _a = anomalies.subscribe("anomalies", counter(&anomaly_calls, Duration::from_secs(45)), QueryOptions::new());
    let _p = predictions.subscribe("predictions", counter(&prediction_calls, Duration::from_millis(10)), QueryOptions::new());

    let scheduler = PollingScheduler::new();
    let _ra = scheduler.register(Arc::new(anomalies.clone()), "anomalies", Duration::from_secs(30));
    let _rp = scheduler.register(Arc::new(predictions.clone()), "predictions", Duration::from_secs(60));

    sleep(Duration::from_secs(125)).await;

    // Ticks at 60 and 120 each start a fetch
    assert_eq!(prediction_calls.load(Ordering::SeqCst), 3);
    // Ticks at 30 and 90 land while a 45s fetch is still running
    assert_eq!(anomaly_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stopping_registrations_halts_refreshes() {
    let cache = QueryCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let _sub = cache.subscribe("anomalies", counter(&calls, Duration::from_millis(10)), QueryOptions::new());

    let scheduler = PollingScheduler::new();
    let registration = scheduler.register(Arc::new(cache.clone()), "anomalies", Duration::from_secs(30));

    sleep(Duration::from_secs(65)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    scheduler.unregister(registration);
    sleep(Duration::from_secs(120)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let _again = scheduler.register(Arc::new(cache.clone()), "anomalies", Duration::from_secs(30));
    sleep(Duration::from_secs(31)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
