use crate::http::HttpProbe;
use crate::names;
use crate::runtime::RuntimeCollector;
use crate::store::{MetricReader, MetricStore};
use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode};
use axum::routing::get;
use axum::Router;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

fn store() -> MetricStore {
    MetricStore::new(1000, 10)
}

fn seed(store: &MetricStore, name: &str, points: &[(i64, f64)]) {
    let now = Utc::now();
    for (secs_ago, value) in points {
        store.record(name, *value, now - ChronoDuration::seconds(*secs_ago));
    }
}

#[test]
fn window_returns_samples_in_timestamp_order() {
    let store = store();
    seed(&store, "orders.pending", &[(50, 1.0), (40, 2.0), (10, 3.0)]);

    let window = store.window("orders.pending", Duration::from_secs(60));
    assert_eq!(window.len(), 3);
    for pair in window.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }

    // Only the samples inside the window survive the cutoff.
    let window = store.window("orders.pending", Duration::from_secs(30));
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].value, 3.0);
}

#[test]
fn window_of_unknown_metric_is_empty() {
    let store = store();
    assert!(store.window("no.such", Duration::from_secs(60)).is_empty());
    assert_eq!(store.get("no.such"), None);
}

#[test]
fn avg_matches_mean_of_window() {
    let store = store();
    seed(&store, "m.x", &[(30, 1.0), (20, 2.0), (10, 6.0)]);
    let avg = store.avg("m.x", Duration::from_secs(60));
    assert!((avg - 3.0).abs() < 1e-9);

    // Empty window yields zero.
    assert_eq!(store.avg("m.x", Duration::from_secs(0)), 0.0);
    assert_eq!(store.avg("absent", Duration::from_secs(60)), 0.0);
}

#[test]
fn max_matches_window_maximum() {
    let store = store();
    seed(&store, "m.x", &[(30, 1.5), (20, 9.25), (10, 6.0)]);
    assert_eq!(store.max("m.x", Duration::from_secs(60)), 9.25);
    assert_eq!(store.max("m.x", Duration::from_secs(0)), 0.0);
}

#[test]
fn max_handles_negative_values() {
    let store = store();
    seed(&store, "m.neg", &[(30, -5.0), (20, -2.0), (10, -9.0)]);
    assert_eq!(store.max("m.neg", Duration::from_secs(60)), -2.0);
}

#[test]
fn trend_sign_follows_the_series() {
    let store = store();
    seed(&store, "m.flat", &[(40, 5.0), (20, 5.0), (1, 5.0)]);
    assert_eq!(store.trend("m.flat", Duration::from_secs(60)), 0.0);

    seed(&store, "m.up", &[(60, 10.0), (30, 20.0), (1, 40.0)]);
    assert!(store.trend("m.up", Duration::from_secs(120)) > 0.0);

    seed(&store, "m.down", &[(60, 40.0), (30, 20.0), (1, 10.0)]);
    assert!(store.trend("m.down", Duration::from_secs(120)) < 0.0);
}

#[test]
fn trend_is_rate_per_minute() {
    let store = store();
    let now = Utc::now();
    store.record("m.rate", 100.0, now - ChronoDuration::seconds(60));
    store.record("m.rate", 250.0, now);
    let trend = store.trend("m.rate", Duration::from_secs(120));
    assert!((trend - 150.0).abs() < 1.0);
}

#[test]
fn trend_needs_two_samples() {
    let store = store();
    seed(&store, "m.single", &[(10, 5.0)]);
    assert_eq!(store.trend("m.single", Duration::from_secs(60)), 0.0);
}

#[test]
fn custom_metric_cap_rejects_new_names_but_allows_updates() {
    let store = MetricStore::new(100, 2);
    store.update_custom("a.one", 1.0).unwrap();
    store.update_custom("a.two", 2.0).unwrap();
    assert!(store.update_custom("a.three", 3.0).is_err());

    // Updating an existing name is always permitted.
    store.update_custom("a.one", 10.0).unwrap();
    assert_eq!(store.get("a.one"), Some(10.0));
    assert_eq!(store.custom_metric_count(), 2);
}

#[test]
fn builtin_names_do_not_count_against_the_custom_cap() {
    let store = MetricStore::new(100, 1);
    store.update_custom(names::HEAP_ALLOC, 5.0).unwrap();
    store.update_custom("user.metric", 1.0).unwrap();
    assert_eq!(store.custom_metric_count(), 1);
}

#[test]
fn history_is_ring_bounded() {
    let store = MetricStore::new(5, 10);
    seed(
        &store,
        "m.ring",
        &[(9, 1.0), (8, 2.0), (7, 3.0), (6, 4.0), (5, 5.0), (4, 6.0), (3, 7.0)],
    );
    let window = store.window("m.ring", Duration::from_secs(60));
    assert_eq!(window.len(), 5);
    // Oldest entries were evicted first.
    assert_eq!(window[0].value, 3.0);
}

#[test]
fn probe_counts_requests_and_errors_atomically() {
    let probe = Arc::new(HttpProbe::new(100));
    let threads: Vec<_> = (0..8)
        .map(|worker| {
            let probe = Arc::clone(&probe);
            std::thread::spawn(move || {
                for i in 0..250 {
                    let status = if (worker + i) % 5 == 0 { 500 } else { 200 };
                    probe.record(1_000_000, status);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }

    let stats = probe.stats();
    assert_eq!(stats.request_count, 2000);
    assert_eq!(stats.error_count, 400);
    assert!((stats.error_rate - 20.0).abs() < 1e-9);
    assert_eq!(stats.pending_requests, 0);
}

#[test]
fn probe_tracks_max_response_time() {
    let probe = HttpProbe::new(10);
    probe.record(5_000_000, 200);
    probe.record(2_000_000, 200);
    probe.record(9_000_000, 200);
    let stats = probe.stats();
    assert!((stats.max_response_time - 9.0).abs() < 1e-9);
    assert!(stats.avg_response_time > 0.0);
}

#[test]
fn probe_sample_ring_is_bounded() {
    let probe = HttpProbe::new(4);
    for i in 0..10 {
        probe.record(i, 200);
    }
    assert_eq!(probe.response_time_samples().len(), 4);
}

#[tokio::test]
async fn probe_middleware_observes_status_codes() {
    let store = Arc::new(MetricStore::new(100, 10));
    let probe = Arc::new(HttpProbe::with_store(100, Arc::clone(&store)));

    let app = Router::new()
        .route("/ok", get(|| async { "fine" }))
        .route(
            "/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&probe),
            HttpProbe::track,
        ));

    let res = app
        .clone()
        .oneshot(HttpRequest::get("/ok").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(HttpRequest::get("/broken").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let stats = probe.stats();
    assert_eq!(stats.request_count, 2);
    assert_eq!(stats.error_count, 1);
    assert_eq!(stats.pending_requests, 0);

    // The probe published its stats into the store.
    assert_eq!(store.get(names::HTTP_REQUEST_COUNT), Some(2.0));
    assert_eq!(store.get(names::HTTP_ERROR_COUNT), Some(1.0));
}

#[tokio::test]
async fn collector_publishes_builtin_names() {
    let store = Arc::new(MetricStore::new(100, 10));
    let collector = RuntimeCollector::new(Arc::clone(&store), Duration::from_millis(100), 16);

    collector.collect();
    collector.collect();

    assert!(store.get(names::HEAP_ALLOC).is_some());
    assert!(store.get(names::TASKS_COUNT).is_some());
    assert_eq!(collector.history_len(), 2);
    assert!(collector.current().is_some());
}

#[tokio::test]
async fn collector_history_ring_is_bounded() {
    let store = Arc::new(MetricStore::new(100, 10));
    let collector = RuntimeCollector::new(Arc::clone(&store), Duration::from_millis(100), 3);
    for _ in 0..8 {
        collector.collect();
    }
    assert_eq!(collector.history_len(), 3);
}

#[tokio::test]
async fn collector_start_and_stop_are_idempotent() {
    let store = Arc::new(MetricStore::new(100, 10));
    let collector = Arc::new(RuntimeCollector::new(
        Arc::clone(&store),
        Duration::from_millis(10),
        100,
    ));

    collector.stop();
    collector.start();
    collector.start();
    tokio::time::sleep(Duration::from_millis(60)).await;
    collector.stop();
    collector.stop();

    assert!(collector.history_len() >= 1);
}

#[test]
fn builtin_kind_lookup() {
    use crate::names::{builtin_kind, MetricKind};
    assert_eq!(builtin_kind("heap", "alloc"), Some(MetricKind::Integer));
    assert_eq!(builtin_kind("gc", "pause"), Some(MetricKind::Float));
    assert_eq!(
        builtin_kind("http", "response_time"),
        Some(MetricKind::Float)
    );
    assert_eq!(builtin_kind("heap", "bogus"), None);
    assert_eq!(builtin_kind("nope", "alloc"), None);
}
