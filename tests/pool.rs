use std::time::Duration;

use hue_bridge_rs::{
    BridgeConfig, BridgePool, CacheBackendKind, Error, HealthStatus, LightState, PoolConfig,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn pool_config() -> PoolConfig {
    PoolConfig {
        max_connections: 2,
        probe_timeout: Duration::from_millis(300),
        bridge: BridgeConfig::default()
            .with_cache_backend(CacheBackendKind::Memory)
            .with_retry(1, vec![Duration::from_millis(10)]),
    }
}

async fn bridge(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tok/config"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "Hue Bridge", "apiversion": "1.56.0"}))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_health_check_marks_slow_bridge_unhealthy() {
    let fast_a = bridge(Duration::ZERO).await;
    let fast_b = bridge(Duration::ZERO).await;
    let slow = bridge(Duration::from_secs(3)).await;

    let pool = BridgePool::new(pool_config()).unwrap();
    for server in [&fast_a, &fast_b, &slow] {
        pool.add_endpoint(&server.uri(), Some("tok")).await;
    }
    assert_eq!(pool.active_connections().await, 0);
    assert_eq!(
        pool.health(&slow.uri()).await.unwrap().status,
        HealthStatus::Unknown
    );

    let reports = pool.health_check_all().await;
    assert_eq!(reports.len(), 3);
    assert!(reports[&fast_a.uri()].is_healthy());
    assert!(reports[&fast_b.uri()].latency.is_some());

    let slow_report = &reports[&slow.uri()];
    assert_eq!(slow_report.status, HealthStatus::Unhealthy);
    assert!(slow_report.error.as_deref().unwrap().contains("timed out"));

    assert_eq!(pool.active_connections().await, 2);
    assert_eq!(pool.len().await, 3);
}

#[tokio::test]
async fn test_connect_probes_once() {
    let up = bridge(Duration::ZERO).await;
    let pool = BridgePool::new(pool_config()).unwrap();

    let report = pool.connect(&up.uri(), Some("tok")).await.unwrap();
    assert!(report.is_healthy());
    assert_eq!(pool.active_connections().await, 1);

    // A bridge that answers with an error stays in the pool, unhealthy.
    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tok/config"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&down)
        .await;
    let report = pool.connect(&down.uri(), Some("tok")).await.unwrap();
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert_eq!(pool.len().await, 2);
    assert_eq!(pool.active_connections().await, 1);
}

#[tokio::test]
async fn test_broadcast_reports_every_endpoint() {
    let ok_a = MockServer::start().await;
    let ok_b = MockServer::start().await;
    let failing = MockServer::start().await;

    for server in [&ok_a, &ok_b] {
        Mock::given(method("PUT"))
            .and(path("/api/tok/groups/0/action"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"success": {"/groups/0/action/on": true}}])),
            )
            .expect(1)
            .mount(server)
            .await;
    }
    Mock::given(method("PUT"))
        .and(path("/api/tok/groups/0/action"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"error": {"type": 3, "address": "/groups/0", "description": "resource, /groups/0, not available"}}
        ])))
        .expect(1)
        .mount(&failing)
        .await;

    let pool = BridgePool::new(pool_config()).unwrap();
    for server in [&ok_a, &ok_b, &failing] {
        pool.add_endpoint(&server.uri(), Some("tok")).await;
    }

    let mut state = LightState::new();
    state.on(true);
    let state = &state;
    let results = pool
        .broadcast(|pipeline| async move { pipeline.set_group_state("0", state).await })
        .await;

    assert_eq!(results.len(), 3);
    assert!(results[&ok_a.uri()].is_ok());
    assert!(results[&ok_b.uri()].is_ok());
    assert!(matches!(
        results[&failing.uri()],
        Err(Error::Protocol { error_type: 3, .. })
    ));
}

#[tokio::test]
async fn test_pool_pipelines_share_one_cache() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("GET"))
            .and(path("/api/tok/lights"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"1": {"name": server.uri()}})))
            .expect(1)
            .mount(server)
            .await;
    }

    let pool = BridgePool::new(pool_config()).unwrap();
    pool.add_endpoint(&first.uri(), Some("tok")).await;
    pool.add_endpoint(&second.uri(), Some("tok")).await;

    let a = pool.get_pipeline(&first.uri()).await.unwrap();
    let b = pool.get_pipeline(&second.uri()).await.unwrap();

    // Same path on two bridges never collides in the shared cache.
    let from_a = a.get("lights").await.unwrap();
    let from_b = b.get("lights").await.unwrap();
    assert_ne!(from_a, from_b);
    assert_eq!(a.get("lights").await.unwrap(), from_a);

    let stats = pool.cache().unwrap().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 2);
}
