//! On-disk cache storage, one JSON document per entry.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use super::{CacheBackend, CacheEntry};
use crate::errors::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

const EXTENSION: &str = "json";

/// Stores entries as `{dir}/{resource_type}/{sha256(key)}.json`.
///
/// Keys are `"{resource_type}:{logical_key}"`, so every resource type gets its
/// own subdirectory and invalidating one type removes only that directory.
///
/// All file operations are synchronous and run on the calling task. Prefer
/// [`MemoryBackend`](super::MemoryBackend) for latency-sensitive pools.
#[derive(Debug)]
pub struct FilesystemBackend {
    dir: PathBuf,
    writes: AtomicU64,
}

impl FilesystemBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| CacheError::io("create_dir", e))?;
        Ok(FilesystemBackend {
            dir,
            writes: AtomicU64::new(0),
        })
    }

    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("hue-bridge-rs-cache")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory holding every entry whose key starts with `"{scope}:"`.
    fn scope_dir(&self, scope: &str) -> PathBuf {
        let safe = !scope.is_empty()
            && scope
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if safe {
            self.dir.join(scope)
        } else {
            // Keep odd names (`..`, separators) from escaping the cache dir.
            self.dir.join(format!("_{}", hex_digest(scope)))
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let scope = key.split_once(':').map_or("", |(scope, _)| scope);
        self.scope_dir(scope)
            .join(hex_digest(key))
            .with_extension(EXTENSION)
    }
}

fn hex_digest(value: &str) -> String {
    Sha256::digest(value.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn count_entries(dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CacheError::io("read_dir", e)),
    };
    let mut count = 0;
    for entry in entries {
        let path = entry.map_err(|e| CacheError::io("read_dir", e))?.path();
        if path.extension().is_some_and(|ext| ext == EXTENSION) {
            count += 1;
        }
    }
    Ok(count)
}

impl CacheBackend for FilesystemBackend {
    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io("read", e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(CacheError::Serde)
    }

    fn store(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec(entry).map_err(CacheError::Serde)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::io("create_dir", e))?;
        }

        // Write aside then rename so readers never see a partial document.
        let seq = self.writes.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), seq));
        fs::write(&tmp, bytes).map_err(|e| CacheError::io("write", e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            CacheError::io("rename", e)
        })
    }

    fn remove(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io("remove", e)),
        }
    }

    /// Only whole-scope prefixes (`"lights:"`) can be matched on disk.
    fn remove_prefix(&self, prefix: &str) -> Result<Option<usize>> {
        let Some(scope) = prefix.strip_suffix(':').filter(|s| !s.contains(':')) else {
            return Ok(None);
        };
        let dir = self.scope_dir(scope);
        let count = count_entries(&dir)?;
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(Some(count)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Some(0)),
            Err(e) => Err(CacheError::io("remove_dir", e)),
        }
    }

    fn clear(&self) -> Result<()> {
        let entries = fs::read_dir(&self.dir).map_err(|e| CacheError::io("read_dir", e))?;
        for entry in entries {
            let path = entry.map_err(|e| CacheError::io("read_dir", e))?.path();
            let removed = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else if path.extension().is_some_and(|ext| ext == EXTENSION) {
                fs::remove_file(&path)
            } else {
                continue;
            };
            match removed {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io("remove", e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::resource::ResourceType;
    use serde_json::json;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_entries_survive_a_new_backend() {
        let dir = tempfile::tempdir().unwrap();
        let entry = CacheEntry {
            resource_type: "config".into(),
            key: "GET config".into(),
            value: json!({"name": "Hallway"}),
            expires_at: SystemTime::now() + Duration::from_secs(60),
        };

        FilesystemBackend::new(dir.path())
            .unwrap()
            .store("config:GET config", &entry)
            .unwrap();

        let reopened = FilesystemBackend::new(dir.path()).unwrap();
        let loaded = reopened.load("config:GET config").unwrap().unwrap();
        assert_eq!(loaded.value, entry.value);
        assert!(reopened.load("config:other").unwrap().is_none());
        assert!(dir.path().join("config").is_dir());
    }

    #[test]
    fn test_corrupt_file_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).unwrap();
        let path = backend.path_for("lights:x");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"{not json").unwrap();
        assert!(matches!(backend.load("lights:x"), Err(CacheError::Serde(_))));
    }

    #[test]
    fn test_invalidate_keeps_other_resource_types() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(FilesystemBackend::new(dir.path()).unwrap());
        cache.set(&ResourceType::Lights, "GET lights", json!({}), None);
        cache.set(&ResourceType::Lights, "GET lights/1", json!({}), None);
        cache.set(&ResourceType::Groups, "GET groups", json!({"0": {}}), None);

        assert!(cache.invalidate(&ResourceType::Lights));
        assert!(cache.get(&ResourceType::Lights, "GET lights").is_none());
        assert!(cache.get(&ResourceType::Lights, "GET lights/1").is_none());
        assert_eq!(
            cache.get(&ResourceType::Groups, "GET groups"),
            Some(json!({"0": {}}))
        );

        // Writes after an invalidation recreate the directory.
        assert!(cache.set(&ResourceType::Lights, "GET lights", json!({"1": {}}), None));
        assert!(cache.get(&ResourceType::Lights, "GET lights").is_some());
    }

    #[test]
    fn test_prefix_removal_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).unwrap();
        let entry = CacheEntry {
            resource_type: "sensors".into(),
            key: "k".into(),
            value: json!(1),
            expires_at: SystemTime::now() + Duration::from_secs(5),
        };
        backend.store("sensors:a", &entry).unwrap();
        backend.store("sensors:b", &entry).unwrap();

        assert_eq!(backend.remove_prefix("sensors:").unwrap(), Some(2));
        assert_eq!(backend.remove_prefix("sensors:").unwrap(), Some(0));
        assert_eq!(backend.remove_prefix("sensors:GET").unwrap(), None);
    }

    #[test]
    fn test_odd_scope_names_stay_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path()).unwrap();
        let path = backend.path_for("..:GET ../x");
        assert!(path.starts_with(dir.path()));
        assert!(!path.components().any(|c| c == std::path::Component::ParentDir));
    }

    #[test]
    fn test_clear_removes_every_scope() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(FilesystemBackend::new(dir.path()).unwrap());
        cache.set(&ResourceType::Scenes, "GET scenes", json!([]), None);
        cache.set(&ResourceType::Config, "GET config", json!({}), None);

        assert!(cache.clear());
        assert!(cache.get(&ResourceType::Scenes, "GET scenes").is_none());
        assert!(cache.get(&ResourceType::Config, "GET config").is_none());
    }

    #[test]
    fn test_remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(FilesystemBackend::new(dir.path()).unwrap());
        cache.set(&ResourceType::Scenes, "GET scenes", json!([]), None);
        assert!(cache.delete(&ResourceType::Scenes, "GET scenes"));
        assert!(!cache.delete(&ResourceType::Scenes, "GET scenes"));
    }
}
