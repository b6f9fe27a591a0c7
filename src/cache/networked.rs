//! Networked cache storage on a Redis server.

use std::fmt;
use std::sync::Mutex;
use std::time::SystemTime;

use redis::Commands;

use super::{CacheBackend, CacheEntry};
use crate::errors::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// Entries live under `hue-bridge:` and expire server-side through `PX`.
pub struct RedisBackend {
    conn: Mutex<redis::Connection>,
    namespace: String,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    pub const NAMESPACE: &'static str = "hue-bridge:";

    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(RedisBackend {
            conn: Mutex::new(conn),
            namespace: Self::NAMESPACE.to_string(),
        })
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    /// Delete every key starting with `prefix`, walking the keyspace with `SCAN`.
    fn delete_prefixed(&self, prefix: &str) -> Result<usize> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.lock()?;
        let mut keys: Vec<String> = conn.scan_match::<_, String>(pattern)?.collect();
        if keys.is_empty() {
            return Ok(0);
        }
        // SCAN may report a key more than once.
        keys.sort_unstable();
        keys.dedup();
        let removed: usize = conn.del(keys)?;
        Ok(removed)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, redis::Connection>> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Backend("redis connection lock poisoned".into()))
    }
}

impl CacheBackend for RedisBackend {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(key))
            .query(&mut *self.lock()?)?;
        raw.map(|raw| serde_json::from_str(&raw).map_err(CacheError::Serde))
            .transpose()
    }

    fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let payload = serde_json::to_string(entry).map_err(CacheError::Serde)?;
        let ttl_ms = entry
            .expires_at
            .duration_since(SystemTime::now())
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            .max(1);
        redis::cmd("SET")
            .arg(self.key(key))
            .arg(payload)
            .arg("PX")
            .arg(ttl_ms)
            .query::<()>(&mut *self.lock()?)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let removed: usize = redis::cmd("DEL")
            .arg(self.key(key))
            .query(&mut *self.lock()?)?;
        Ok(removed > 0)
    }

    fn remove_prefix(&self, prefix: &str) -> Result<Option<usize>> {
        self.delete_prefixed(&self.key(prefix))
            .map(Some)
    }

    fn clear(&self) -> Result<()> {
        self.delete_prefixed(&self.namespace)
            .map(|_| ())
    }
}

/// Escape the characters `SCAN MATCH` treats as glob syntax.
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
