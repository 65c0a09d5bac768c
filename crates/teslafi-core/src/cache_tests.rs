use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::cache::{CacheError, PollingCache, Source};
use crate::config::CacheConfig;
use crate::snapshot::FieldReading;
use crate::test_support::{connect, offline, online, Reply, ScriptedTransport};

#[tokio::test(start_paused = true)]
async fn connect_captures_identity_from_live_feed() {
    // Arrange
    let transport = Arc::new(ScriptedTransport::new().live([Reply::Ok(online(json!({})))]));

    // Act
    let cache = connect(&transport).await;

    // Assert
    let identity = cache.identity();
    assert_eq!(identity.id, "7");
    assert_eq!(identity.vehicle_id.as_deref(), Some("1234"));
    assert_eq!(identity.name(), "redcar");
    assert_eq!(identity.uniq_name(), "000123");
    assert!(cache.is_reachable());
    assert_eq!(transport.live_calls(), 1);
    assert_eq!(transport.last_good_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn connect_falls_back_to_last_good_when_offline() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(offline())])
            .last_good([Reply::Ok(online(json!({ "battery_level": "80" })))]),
    );

    // Act
    let cache = connect(&transport).await;

    // Assert
    assert!(!cache.is_reachable());
    assert_eq!(cache.identity().vin, crate::test_support::VIN);
    assert_eq!(transport.last_good_calls(), 1);
    assert_eq!(
        cache.last_good_snapshot().get("battery_level"),
        Some(&json!("80"))
    );
}

#[tokio::test(start_paused = true)]
async fn connect_fails_without_identity() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(offline())])
            .last_good([Reply::Fail]),
    );

    // Act
    let result = PollingCache::connect(transport.clone(), crate::test_support::config()).await;

    // Assert
    assert!(matches!(result, Err(CacheError::IdentityUnavailable)));
}

#[tokio::test(start_paused = true)]
async fn stalled_fetches_time_out_as_unreachable() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(online(json!({})))])
            .last_good([Reply::Ok(online(json!({})))])
            .with_delay(Duration::from_secs(30)),
    );
    let config = CacheConfig {
        throttle_interval: Duration::from_secs(60),
        fetch_timeout: Duration::from_secs(1),
    };

    // Act
    let result = PollingCache::connect(transport.clone(), config).await;

    // Assert
    assert!(matches!(result, Err(CacheError::IdentityUnavailable)));
    assert_eq!(transport.live_calls(), 1);
    assert_eq!(transport.last_good_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_inside_window_does_not_fetch() {
    // Arrange
    let transport = Arc::new(ScriptedTransport::new().live([Reply::Ok(online(json!({})))]));
    let cache = connect(&transport).await;
    let before = cache.current_snapshot();

    // Act
    tokio::time::advance(Duration::from_secs(30)).await;
    let after = cache.refresh().await;

    // Assert
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(transport.live_calls(), 1);
    assert_eq!(cache.stats().throttled, 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_refreshes_collapse_to_one_fetch() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([
                Reply::Ok(online(json!({ "battery_level": "70" }))),
                Reply::Ok(online(json!({ "battery_level": "71" }))),
            ])
            .with_delay(Duration::from_millis(20)),
    );
    let cache = connect(&transport).await;
    tokio::time::advance(Duration::from_secs(61)).await;

    // Act
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.refresh().await })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.expect("refresh task"));
    }

    // Assert
    assert_eq!(transport.live_calls(), 2);
    let first = &results[0];
    assert!(results.iter().all(|snapshot| Arc::ptr_eq(first, snapshot)));
    assert_eq!(first.get("battery_level"), Some(&json!("71")));
    assert_eq!(cache.stats().throttled, 7);
}

#[tokio::test(start_paused = true)]
async fn force_refresh_bypasses_and_restarts_window() {
    // Arrange
    let transport = Arc::new(ScriptedTransport::new().live([Reply::Ok(online(json!({})))]));
    let cache = connect(&transport).await;

    // Act
    cache.force_refresh().await;
    tokio::time::advance(Duration::from_secs(59)).await;
    cache.refresh().await;

    // Assert
    assert_eq!(transport.live_calls(), 2);
    assert_eq!(cache.stats().refreshes, 2);
    assert_eq!(cache.stats().throttled, 1);
}

#[tokio::test(start_paused = true)]
async fn offline_edge_fetches_last_good_exactly_once() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(online(json!({})))])
            .last_good([Reply::Ok(online(json!({ "Date": "2026-10-17 08:00" })))]),
    );
    let cache = connect(&transport).await;
    transport.push_live(Reply::Ok(offline()));

    // Act
    cache.force_refresh().await;
    let after_edge = transport.last_good_calls();
    cache.force_refresh().await;
    cache.force_refresh().await;

    // Assert
    assert_eq!(after_edge, 1);
    assert_eq!(transport.last_good_calls(), 1);
    assert!(!cache.is_reachable());
    assert_eq!(
        cache.last_good_snapshot().get("Date"),
        Some(&json!("2026-10-17 08:00"))
    );
}

#[tokio::test(start_paused = true)]
async fn coming_back_online_rearms_the_edge() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(online(json!({})))])
            .last_good([Reply::Ok(online(json!({})))]),
    );
    let cache = connect(&transport).await;

    // Act
    transport.push_live(Reply::Ok(offline()));
    cache.force_refresh().await;
    transport.push_live(Reply::Ok(online(json!({}))));
    cache.force_refresh().await;
    transport.push_live(Reply::Ok(offline()));
    cache.force_refresh().await;

    // Assert
    assert_eq!(transport.last_good_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn last_good_is_never_replaced_by_unreachable_snapshot() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(online(json!({ "battery_level": "64" })))])
            .last_good([Reply::Fail]),
    );
    let cache = connect(&transport).await;
    let good = cache.last_good_snapshot();
    transport.push_live(Reply::Ok(offline()));

    // Act
    cache.force_refresh().await;

    // Assert
    assert!(Arc::ptr_eq(&good, &cache.last_good_snapshot()));
    assert!(cache.last_good_snapshot().is_reachable());
    assert!(!cache.current_snapshot().is_reachable());
}

#[tokio::test(start_paused = true)]
async fn unreachable_last_good_reply_keeps_previous_record() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(online(json!({ "battery_level": "50" })))])
            .last_good([Reply::Ok(offline())]),
    );
    let cache = connect(&transport).await;
    let good = cache.last_good_snapshot();
    transport.push_live(Reply::Fail);

    // Act
    cache.force_refresh().await;

    // Assert
    assert_eq!(transport.last_good_calls(), 1);
    assert_eq!(cache.stats().last_good_fetches, 1);
    assert!(Arc::ptr_eq(&good, &cache.last_good_snapshot()));
    assert_eq!(
        cache.view().read(Source::LastGood, "battery_level"),
        Some(FieldReading::Exact(json!("50")))
    );
}

#[tokio::test(start_paused = true)]
async fn transport_failure_is_absorbed_as_unreachable() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new()
            .live([Reply::Ok(online(json!({})))])
            .last_good([Reply::Ok(online(json!({})))]),
    );
    let cache = connect(&transport).await;
    transport.push_live(Reply::Fail);

    // Act
    let snapshot = cache.force_refresh().await;

    // Assert
    assert!(!snapshot.is_reachable());
    assert!(!cache.is_reachable());
    assert_eq!(cache.stats().transport_failures, 1);
    assert_eq!(transport.last_good_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn identity_stays_fixed_when_feed_reports_another_vehicle() {
    // Arrange
    let transport = Arc::new(ScriptedTransport::new().live([Reply::Ok(online(json!({})))]));
    let cache = connect(&transport).await;
    transport.push_live(Reply::Ok(online(json!({ "id": "99", "vin": "XYZ999888" }))));

    // Act
    cache.force_refresh().await;

    // Assert
    assert_eq!(cache.identity().id, "7");
    assert_eq!(cache.identity().uniq_name(), "000123");
}

#[tokio::test(start_paused = true)]
async fn executed_refresh_clears_optimistic_patches() {
    // Arrange
    let transport = Arc::new(
        ScriptedTransport::new().live([Reply::Ok(online(json!({ "locked": "False" })))]),
    );
    let cache = connect(&transport).await;
    cache.patch("locked", FieldReading::Exact(json!("True")));
    assert_eq!(
        cache.view().read(Source::Current, "locked"),
        Some(FieldReading::Exact(json!("True")))
    );

    // Act
    cache.force_refresh().await;

    // Assert
    assert_eq!(
        cache.view().read(Source::Current, "locked"),
        Some(FieldReading::Exact(json!("False")))
    );
}
