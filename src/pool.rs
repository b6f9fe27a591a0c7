//! Coordinating several bridges at once.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use futures::{FutureExt, StreamExt, stream};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, TimestampMilliSeconds, serde_as};

use crate::cache::ResponseCache;
use crate::config::{BridgeConfig, PoolConfig};
use crate::errors::Error;
use crate::pipeline::RequestPipeline;
use crate::runtime::{self, Instant, Mutex};

type Result<T> = std::result::Result<T, Error>;

/// A bridge known to a pool, identified by its address.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeEndpoint {
    pub address: String,
    pub token: Option<String>,
    pub config: BridgeConfig,
}

/// Outcome of the last probe of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Never probed.
    Unknown,
    Healthy,
    Unhealthy,
}

/// Result of probing one endpoint.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde_as(as = "Option<TimestampMilliSeconds<i64>>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<SystemTime>,
}

impl Default for HealthReport {
    fn default() -> Self {
        HealthReport {
            status: HealthStatus::Unknown,
            latency: None,
            error: None,
            checked_at: None,
        }
    }
}

impl HealthReport {
    pub fn healthy(latency: Duration) -> Self {
        HealthReport {
            status: HealthStatus::Healthy,
            latency: Some(latency),
            error: None,
            checked_at: Some(SystemTime::now()),
        }
    }

    pub fn unhealthy(error: String) -> Self {
        HealthReport {
            status: HealthStatus::Unhealthy,
            latency: None,
            error: Some(error),
            checked_at: Some(SystemTime::now()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

#[derive(Debug)]
struct PoolEntry {
    endpoint: BridgeEndpoint,
    pipeline: Option<Arc<RequestPipeline>>,
    last_health: HealthReport,
}

impl PoolEntry {
    fn new(endpoint: BridgeEndpoint) -> Self {
        PoolEntry {
            endpoint,
            pipeline: None,
            last_health: HealthReport::default(),
        }
    }

    /// The entry's pipeline, built on first use and kept afterwards.
    fn pipeline(&mut self, cache: Option<&Arc<ResponseCache>>) -> Result<Arc<RequestPipeline>> {
        if let Some(pipeline) = &self.pipeline {
            return Ok(pipeline.clone());
        }
        let pipeline = Arc::new(RequestPipeline::with_cache(
            &self.endpoint.address,
            self.endpoint.token.as_deref(),
            &self.endpoint.config,
            cache.cloned(),
        )?);
        debug!("created pipeline for {}", self.endpoint.address);
        self.pipeline = Some(pipeline.clone());
        Ok(pipeline)
    }
}

/// A set of bridges sharing one response cache.
///
/// Pipelines are created lazily, the first time an endpoint is used, and kept
/// for the pool's lifetime. Endpoints that fail a probe stay in the pool;
/// they only drop out of [`BridgePool::active_connections`] until they answer
/// again.
///
/// # Example
///
/// ```
/// use hue_bridge_rs::{BridgeConfig, BridgePool, CacheBackendKind, PoolConfig};
///
/// # tokio_test();
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn tokio_test() {
/// let config = PoolConfig {
///     bridge: BridgeConfig::default().with_cache_backend(CacheBackendKind::Memory),
///     ..PoolConfig::default()
/// };
/// let pool = BridgePool::new(config).unwrap();
/// pool.add_endpoint("192.168.1.20", Some("token-a")).await;
/// pool.add_endpoint("192.168.1.21", Some("token-b")).await;
///
/// assert_eq!(pool.len().await, 2);
/// assert!(pool.get_pipeline("192.168.1.20").await.unwrap().is_registered());
/// assert_eq!(pool.active_connections().await, 0);
/// # }
/// ```
#[derive(Debug)]
pub struct BridgePool {
    config: PoolConfig,
    cache: Option<Arc<ResponseCache>>,
    entries: Mutex<HashMap<String, PoolEntry>>,
}

impl BridgePool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let cache = if config.bridge.cache_enabled {
            Some(Arc::new(ResponseCache::from_kind(
                &config.bridge.cache_backend,
            )?))
        } else {
            None
        };
        Ok(BridgePool {
            config,
            cache,
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Build a pool around an existing cache.
    pub fn with_cache(config: PoolConfig, cache: Arc<ResponseCache>) -> Result<Self> {
        config.validate()?;
        Ok(BridgePool {
            config,
            cache: Some(cache),
            entries: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Add a bridge using the pool's bridge settings.
    ///
    /// Re-adding a known address replaces its token and drops its pipeline.
    pub async fn add_endpoint(&self, address: &str, token: Option<&str>) {
        let endpoint = BridgeEndpoint {
            address: address.to_string(),
            token: token.map(String::from),
            config: self.config.bridge.clone(),
        };
        self.insert(endpoint).await;
    }

    /// Add a bridge with its own settings.
    pub async fn add_endpoint_with_config(
        &self,
        address: &str,
        token: Option<&str>,
        config: BridgeConfig,
    ) -> Result<()> {
        config.validate()?;
        let endpoint = BridgeEndpoint {
            address: address.to_string(),
            token: token.map(String::from),
            config,
        };
        self.insert(endpoint).await;
        Ok(())
    }

    /// Returns whether the address was known.
    pub async fn remove_endpoint(&self, address: &str) -> bool {
        self.entries.lock().await.remove(address).is_some()
    }

    /// Add a bridge and probe it once.
    ///
    /// The endpoint is kept whatever the outcome, so a later probe can
    /// bring it back.
    pub async fn connect(&self, address: &str, token: Option<&str>) -> Result<HealthReport> {
        self.add_endpoint(address, token).await;
        let pipeline = self.get_pipeline(address).await?;
        let report = probe(&pipeline, self.config.probe_timeout).await;
        if let Some(entry) = self.entries.lock().await.get_mut(address) {
            entry.last_health = report.clone();
        }
        Ok(report)
    }

    /// The pipeline for `address`, created on first access.
    pub async fn get_pipeline(&self, address: &str) -> Result<Arc<RequestPipeline>> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .get_mut(address)
            .ok_or_else(|| Error::EndpointNotFound(address.to_string()))?;
        entry.pipeline(self.cache.as_ref())
    }

    pub async fn endpoint(&self, address: &str) -> Option<BridgeEndpoint> {
        self.entries
            .lock()
            .await
            .get(address)
            .map(|e| e.endpoint.clone())
    }

    pub async fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Last probe result of an endpoint.
    pub async fn health(&self, address: &str) -> Option<HealthReport> {
        self.entries
            .lock()
            .await
            .get(address)
            .map(|e| e.last_health.clone())
    }

    /// Endpoints whose last probe succeeded.
    pub async fn active_connections(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|e| e.last_health.is_healthy())
            .count()
    }

    /// Probe every endpoint, at most `max_connections` at a time.
    ///
    /// Each probe reads the bridge config under `probe_timeout`. One failing
    /// or hanging bridge never affects the report of another.
    pub async fn health_check_all(&self) -> HashMap<String, HealthReport> {
        let targets = self.materialize().await;
        let probe_timeout = self.config.probe_timeout;

        let reports: Vec<(String, HealthReport)> = stream::iter(targets)
            .map(move |(address, pipeline)| async move {
                let report = match pipeline {
                    Ok(pipeline) => probe(&pipeline, probe_timeout).await,
                    Err(e) => HealthReport::unhealthy(e.to_string()),
                };
                (address, report)
            })
            .buffer_unordered(self.config.max_connections)
            .collect()
            .await;

        let mut entries = self.entries.lock().await;
        for (address, report) in &reports {
            if let Some(entry) = entries.get_mut(address) {
                entry.last_health = report.clone();
            }
        }
        reports.into_iter().collect()
    }

    /// Run `action` against every endpoint, at most `max_connections` at a time.
    ///
    /// Every endpoint gets exactly one entry in the result. A failing or
    /// panicking action is recorded for its endpoint and never cancels the
    /// others.
    pub async fn broadcast<T, F, Fut>(&self, action: F) -> HashMap<String, Result<T>>
    where
        F: Fn(Arc<RequestPipeline>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let targets = self.materialize().await;
        let action = &action;

        stream::iter(targets)
            .map(move |(address, pipeline)| async move {
                let outcome = match pipeline {
                    Ok(pipeline) => AssertUnwindSafe(async move { action(pipeline).await })
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|panic| {
                            Err(Error::ActionPanicked {
                                address: address.clone(),
                                message: panic_message(panic.as_ref()),
                            })
                        }),
                    Err(e) => Err(e),
                };
                if let Err(e) = &outcome {
                    warn!("broadcast to {} failed: {}", address, e);
                }
                (address, outcome)
            })
            .buffer_unordered(self.config.max_connections)
            .collect()
            .await
    }

    async fn insert(&self, endpoint: BridgeEndpoint) {
        let address = endpoint.address.clone();
        let replaced = self
            .entries
            .lock()
            .await
            .insert(address.clone(), PoolEntry::new(endpoint))
            .is_some();
        if replaced {
            debug!("replaced endpoint {}", address);
        }
    }

    /// Every endpoint paired with its (possibly new) pipeline.
    async fn materialize(&self) -> Vec<(String, Result<Arc<RequestPipeline>>)> {
        let mut entries = self.entries.lock().await;
        entries
            .iter_mut()
            .map(|(address, entry)| (address.clone(), entry.pipeline(self.cache.as_ref())))
            .collect()
    }
}

async fn probe(pipeline: &RequestPipeline, limit: Duration) -> HealthReport {
    let start = Instant::now();
    let report = match runtime::timeout(limit, pipeline.probe()).await {
        Ok(Ok(_)) => HealthReport::healthy(start.elapsed()),
        Ok(Err(e)) => HealthReport::unhealthy(e.to_string()),
        Err(_) => HealthReport::unhealthy(format!("probe timed out after {:?}", limit)),
    };
    if !report.is_healthy() {
        warn!(
            "bridge {} unhealthy: {}",
            pipeline.address(),
            report.error.as_deref().unwrap_or_default()
        );
    }
    report
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheBackendKind;

    fn pool() -> BridgePool {
        BridgePool::new(PoolConfig {
            bridge: BridgeConfig::default().with_cache_backend(CacheBackendKind::Memory),
            ..PoolConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_pipelines_are_created_once() {
        let pool = pool();
        pool.add_endpoint("10.0.0.2", Some("a")).await;

        let first = pool.get_pipeline("10.0.0.2").await.unwrap();
        let second = pool.get_pipeline("10.0.0.2").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.cache().unwrap(), pool.cache().unwrap()));
    }

    #[tokio::test]
    async fn test_readding_replaces_token() {
        let pool = pool();
        pool.add_endpoint("10.0.0.2", Some("old")).await;
        let before = pool.get_pipeline("10.0.0.2").await.unwrap();

        pool.add_endpoint("10.0.0.2", Some("new")).await;
        let after = pool.get_pipeline("10.0.0.2").await.unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.token().as_deref(), Some("new"));
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_and_missing_endpoint() {
        let pool = pool();
        pool.add_endpoint("10.0.0.2", None).await;
        assert!(pool.remove_endpoint("10.0.0.2").await);
        assert!(!pool.remove_endpoint("10.0.0.2").await);
        assert_eq!(
            pool.get_pipeline("10.0.0.2").await.unwrap_err(),
            Error::EndpointNotFound("10.0.0.2".into())
        );
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn test_broadcast_isolates_failures_and_panics() {
        let pool = pool();
        for address in ["10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"] {
            pool.add_endpoint(address, Some("t")).await;
        }

        let results = pool
            .broadcast(|pipeline| async move {
                match pipeline.address() {
                    "10.0.0.3" => Err(Error::transport("send", "unreachable")),
                    "10.0.0.4" => panic!("action blew up"),
                    other => Ok(other.len()),
                }
            })
            .await;

        assert_eq!(results.len(), 4);
        assert_eq!(results["10.0.0.2"].as_ref().unwrap(), &8);
        assert_eq!(results["10.0.0.5"].as_ref().unwrap(), &8);
        assert!(matches!(results["10.0.0.3"], Err(Error::Transport { .. })));
        assert_eq!(
            results["10.0.0.4"].as_ref().unwrap_err(),
            &Error::ActionPanicked {
                address: "10.0.0.4".into(),
                message: "action blew up".into()
            }
        );
    }

    #[test]
    fn test_health_report_serialization() {
        let json = serde_json::to_value(HealthReport::healthy(Duration::from_millis(42))).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["latency"], 42);
        assert!(json.get("error").is_none());

        let json = serde_json::to_value(HealthReport::default()).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unknown"}));
    }
}
