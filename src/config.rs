//! Typed configuration for pipelines and pools.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, DurationSecondsWithFrac, serde_as};

use crate::errors::Error;
use crate::retry::RetryPolicy;

type Result<T> = std::result::Result<T, Error>;

/// Where a [`crate::ResponseCache`] keeps its entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Process-local map.
    Memory,
    /// One JSON file per entry, read and written synchronously. `None` selects a
    /// directory under the system temp dir.
    Filesystem {
        #[serde(default)]
        dir: Option<PathBuf>,
    },
    /// Redis server at `url`. Requires the `cache-redis` feature.
    Networked { url: String },
}

impl Default for CacheBackendKind {
    fn default() -> Self {
        CacheBackendKind::Filesystem { dir: None }
    }
}

/// Settings for a single bridge connection.
///
/// Fields are fixed once a [`crate::RequestPipeline`] is built from them.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hue_bridge_rs::{BridgeConfig, CacheBackendKind};
///
/// let config = BridgeConfig::default()
///     .with_timeout(Duration::from_secs(2))
///     .with_cache_backend(CacheBackendKind::Memory);
/// assert!(config.validate().is_ok());
/// assert!(!config.verify_tls);
/// assert_eq!(config.retry_attempts, 3);
/// ```
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Per wire call timeout.
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub timeout: Duration,
    /// Bridges ship self-signed certificates, so verification is off by default.
    pub verify_tls: bool,
    pub retry_attempts: u32,
    #[serde_as(as = "Vec<DurationMilliSeconds<u64>>")]
    pub retry_delays: Vec<Duration>,
    pub cache_enabled: bool,
    pub cache_backend: CacheBackendKind,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        BridgeConfig {
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            verify_tls: false,
            retry_attempts: retry.max_retries(),
            retry_delays: retry.delays().to_vec(),
            cache_enabled: true,
            cache_backend: CacheBackendKind::default(),
        }
    }
}

impl BridgeConfig {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delays: Vec<Duration>) -> Self {
        self.retry_attempts = attempts;
        self.retry_delays = delays;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_cache_backend(mut self, backend: CacheBackendKind) -> Self {
        self.cache_backend = backend;
        self
    }

    /// Check the settings once, before anything is built from them.
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidConfig("timeout must be greater than zero".into()));
        }
        if self.retry_delays.is_empty() {
            return Err(Error::InvalidConfig(
                "retry_delays needs at least one entry".into(),
            ));
        }
        if self.cache_enabled
            && matches!(self.cache_backend, CacheBackendKind::Networked { .. })
            && !cfg!(feature = "cache-redis")
        {
            return Err(Error::InvalidConfig(
                "networked cache backend requires the cache-redis feature".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for a [`crate::BridgePool`].
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Upper bound on concurrent probes or broadcast actions.
    pub max_connections: usize,
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub probe_timeout: Duration,
    /// Template for every pipeline the pool creates.
    pub bridge: BridgeConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            probe_timeout: Duration::from_secs(Self::DEFAULT_PROBE_TIMEOUT_SECS),
            bridge: BridgeConfig::default(),
        }
    }
}

impl PoolConfig {
    pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
    pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(Error::InvalidConfig(
                "max_connections must be greater than zero".into(),
            ));
        }
        self.bridge.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(!config.verify_tls);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(
            config.retry_delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
        assert!(config.cache_enabled);
        assert_eq!(config.cache_backend, CacheBackendKind::Filesystem { dir: None });
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{"timeout": 2.5, "retry_delays": [250, 500], "cache_backend": {"kind": "memory"}}"#,
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(
            config.retry_delays,
            vec![Duration::from_millis(250), Duration::from_millis(500)]
        );
        assert_eq!(config.cache_backend, CacheBackendKind::Memory);
        assert_eq!(config.retry_attempts, 3);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_validation() {
        assert!(BridgeConfig::default().validate().is_ok());
        assert!(
            BridgeConfig::default()
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(BridgeConfig::default().with_retry(3, vec![]).validate().is_err());

        let networked = BridgeConfig::default().with_cache_backend(CacheBackendKind::Networked {
            url: "redis://127.0.0.1/".into(),
        });
        assert_eq!(networked.validate().is_ok(), cfg!(feature = "cache-redis"));
        assert!(networked.with_cache_enabled(false).validate().is_ok());

        let pool = PoolConfig {
            max_connections: 0,
            ..PoolConfig::default()
        };
        assert!(pool.validate().is_err());
    }
}
