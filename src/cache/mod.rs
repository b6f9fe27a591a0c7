//! Read-through response cache with pluggable storage.
//!
//! Entries are scoped by [`ResourceType`]: the storage key of every entry is
//! `"{resource_type}:{logical_key}"`, so invalidating one resource type is a
//! prefix delete that leaves every other type untouched. Backend failures are
//! logged and treated as misses; the cache never fails a request.

mod filesystem;
mod memory;
#[cfg(feature = "cache-redis")]
mod networked;

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{TimestampMilliSeconds, serde_as};

use crate::config::CacheBackendKind;
use crate::errors::{CacheError, Error};
use crate::resource::ResourceType;

pub use filesystem::FilesystemBackend;
pub use memory::MemoryBackend;
#[cfg(feature = "cache-redis")]
pub use networked::RedisBackend;

type Result<T> = std::result::Result<T, Error>;

/// A stored response.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub resource_type: String,
    pub key: String,
    pub value: Value,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub expires_at: SystemTime,
}

impl CacheEntry {
    pub fn is_expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// Storage behind a [`ResponseCache`].
///
/// Implementations must tolerate concurrent callers; overlapping writes to the
/// same key may resolve in any order.
pub trait CacheBackend: Send + Sync + fmt::Debug {
    fn load(&self, key: &str) -> std::result::Result<Option<CacheEntry>, CacheError>;

    fn store(&self, key: &str, entry: &CacheEntry) -> std::result::Result<(), CacheError>;

    /// Returns whether an entry was present.
    fn remove(&self, key: &str) -> std::result::Result<bool, CacheError>;

    /// Remove every key starting with `prefix`.
    ///
    /// Returns `Ok(None)` when the backend cannot match keys by prefix.
    fn remove_prefix(&self, _prefix: &str) -> std::result::Result<Option<usize>, CacheError> {
        Ok(None)
    }

    fn clear(&self) -> std::result::Result<(), CacheError>;
}

/// Hit and miss counters for a [`ResponseCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Key/value cache with per resource type time-to-live.
///
/// # Example
///
/// ```
/// use hue_bridge_rs::{ResourceType, ResponseCache};
/// use serde_json::json;
///
/// let cache = ResponseCache::memory();
/// assert!(cache.set(&ResourceType::Lights, "GET lights", json!({"1": {}}), None));
/// assert!(cache.set(&ResourceType::Groups, "GET groups", json!({}), None));
///
/// assert!(cache.invalidate(&ResourceType::Lights));
/// assert!(cache.get(&ResourceType::Lights, "GET lights").is_none());
/// assert!(cache.get(&ResourceType::Groups, "GET groups").is_some());
/// ```
#[derive(Debug)]
pub struct ResponseCache {
    backend: Box<dyn CacheBackend>,
    ttls: HashMap<ResourceType, Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        ResponseCache {
            backend: Box::new(backend),
            ttls: HashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Build a cache on the backend selected by configuration.
    pub fn from_kind(kind: &CacheBackendKind) -> Result<Self> {
        match kind {
            CacheBackendKind::Memory => Ok(Self::memory()),
            CacheBackendKind::Filesystem { dir } => {
                let dir = dir.clone().unwrap_or_else(FilesystemBackend::default_dir);
                FilesystemBackend::new(dir)
                    .map(Self::new)
                    .map_err(|e| Error::InvalidConfig(e.to_string()))
            }
            #[cfg(feature = "cache-redis")]
            CacheBackendKind::Networked { url } => RedisBackend::new(url)
                .map(Self::new)
                .map_err(|e| Error::InvalidConfig(e.to_string())),
            #[cfg(not(feature = "cache-redis"))]
            CacheBackendKind::Networked { .. } => Err(Error::InvalidConfig(
                "networked cache backend requires the cache-redis feature".into(),
            )),
        }
    }

    /// Override the default time-to-live of one resource type.
    pub fn with_ttl(mut self, resource_type: ResourceType, ttl: Duration) -> Self {
        self.ttls.insert(resource_type, ttl);
        self
    }

    pub fn ttl_for(&self, resource_type: &ResourceType) -> Duration {
        self.ttls
            .get(resource_type)
            .copied()
            .unwrap_or_else(|| resource_type.default_ttl())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Stored value for `key`, or `None` on a miss or backend failure.
    pub fn get(&self, resource_type: &ResourceType, key: &str) -> Option<Value> {
        let storage_key = storage_key(resource_type, key);
        let entry = match self.backend.load(&storage_key) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cache read of {} failed: {}", storage_key, e);
                None
            }
        };

        match entry {
            Some(entry) if !entry.is_expired(SystemTime::now()) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("cache hit {}", storage_key);
                Some(entry.value)
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("cache entry {} expired", storage_key);
                if let Err(e) = self.backend.remove(&storage_key) {
                    warn!("cache eviction of {} failed: {}", storage_key, e);
                }
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("cache miss {}", storage_key);
                None
            }
        }
    }

    /// Read-through lookup.
    ///
    /// On a hit the stored value is returned and `producer` is not called. On
    /// a miss `producer` runs and its value is stored under the resource
    /// type's time-to-live. Producer errors propagate and are not cached.
    pub async fn get_or_insert_with<F, Fut>(
        &self,
        resource_type: &ResourceType,
        key: &str,
        producer: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(value) = self.get(resource_type, key) {
            return Ok(value);
        }
        let value = producer().await?;
        self.set(resource_type, key, value.clone(), None);
        Ok(value)
    }

    /// Store `value`, replacing any previous entry for `key`.
    pub fn set(
        &self,
        resource_type: &ResourceType,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> bool {
        let ttl = ttl.unwrap_or_else(|| self.ttl_for(resource_type));
        let storage_key = storage_key(resource_type, key);
        let entry = CacheEntry {
            resource_type: resource_type.to_string(),
            key: key.to_string(),
            value,
            expires_at: SystemTime::now() + ttl,
        };

        match self.backend.store(&storage_key, &entry) {
            Ok(()) => true,
            Err(e) => {
                warn!("cache write of {} failed: {}", storage_key, e);
                false
            }
        }
    }

    pub fn delete(&self, resource_type: &ResourceType, key: &str) -> bool {
        let storage_key = storage_key(resource_type, key);
        match self.backend.remove(&storage_key) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("cache delete of {} failed: {}", storage_key, e);
                false
            }
        }
    }

    /// Drop every entry of one resource type.
    ///
    /// Falls back to [`ResponseCache::clear`] on backends without prefix delete.
    pub fn invalidate(&self, resource_type: &ResourceType) -> bool {
        let prefix = format!("{}:", resource_type);
        match self.backend.remove_prefix(&prefix) {
            Ok(Some(count)) => {
                debug!("invalidated {} {} cache entries", count, resource_type);
                true
            }
            Ok(None) => {
                debug!(
                    "cache backend cannot invalidate {} by prefix; clearing",
                    resource_type
                );
                self.clear()
            }
            Err(e) => {
                warn!("cache invalidation of {} failed: {}", resource_type, e);
                false
            }
        }
    }

    pub fn clear(&self) -> bool {
        match self.backend.clear() {
            Ok(()) => true,
            Err(e) => {
                warn!("cache clear failed: {}", e);
                false
            }
        }
    }
}

fn storage_key(resource_type: &ResourceType, key: &str) -> String {
    format!("{}:{}", resource_type, key)
}
