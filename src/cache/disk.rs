use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use crate::cache::{fingerprint, CacheStats, ModMarker, RenderCache, KEY_SEPARATOR};
use crate::error::{Error, ErrorKind};

struct Counters {
    hits: u64,
    misses: u64,
}

/// Render cache persisted to a directory.
///
/// Each entry lives in its own JSON file named by the sha-256 of its key,
/// which keeps arbitrary keys filesystem-safe.  Entry files carry the full
/// key so invalidation by template can find them again.  Slower than
/// [`MemoryCache`](crate::MemoryCache) but survives restarts.
///
/// Storage failures are deliberately quiet: a cache that cannot write only
/// costs re-renders, it never fails the render itself.
pub struct DiskCache {
    dir: PathBuf,
    max_size: usize,
    ttl: Option<Duration>,
    counters: Mutex<Counters>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl DiskCache {
    /// Opens (and creates if needed) a cache directory.
    pub fn new(dir: impl AsRef<Path>, max_size: usize) -> Result<DiskCache, Error> {
        let dir = dir.as_ref().to_path_buf();
        ok!(fs::create_dir_all(&dir).map_err(|err| {
            Error::new(
                ErrorKind::CacheError,
                format!("could not create cache directory {}", dir.display()),
            )
            .with_source(err)
        }));
        Ok(DiskCache {
            dir,
            max_size: max_size.max(1),
            ttl: None,
            counters: Mutex::new(Counters { hits: 0, misses: 0 }),
        })
    }

    /// Expires entries untouched for this long.
    pub fn with_ttl(mut self, ttl: Duration) -> DiskCache {
        self.ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", fingerprint(key.as_bytes())))
    }

    fn entry_files(&self) -> Vec<PathBuf> {
        let mut rv = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().map_or(false, |ext| ext == "json") {
                    rv.push(path);
                }
            }
        }
        rv
    }

    fn is_expired(&self, path: &Path) -> bool {
        let ttl = match self.ttl {
            Some(ttl) => ttl,
            None => return false,
        };
        match fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => match SystemTime::now().duration_since(modified) {
                Ok(age) => age > ttl,
                Err(_) => false,
            },
            Err(_) => true,
        }
    }

    fn read_entry(&self, path: &Path) -> Option<serde_json::Value> {
        let raw = fs::read_to_string(path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entry_files()
            .into_iter()
            .filter_map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                Some((path, modified))
            })
            .min_by_key(|(_, modified)| *modified);
        if let Some((path, _)) = oldest {
            let _ = fs::remove_file(path);
        }
    }

    fn miss(&self) -> Option<String> {
        lock(&self.counters).misses += 1;
        None
    }
}

impl RenderCache for DiskCache {
    fn get(&self, key: &str, marker: ModMarker) -> Option<String> {
        let path = self.entry_path(key);
        if !path.exists() {
            return self.miss();
        }
        if self.is_expired(&path) {
            let _ = fs::remove_file(&path);
            return self.miss();
        }
        let entry = match self.read_entry(&path) {
            Some(entry) => entry,
            None => return self.miss(),
        };
        let stored_marker = entry.get("marker").and_then(|m| m.as_u64());
        if stored_marker != marker {
            let _ = fs::remove_file(&path);
            return self.miss();
        }
        let output = match entry.get("output").and_then(|o| o.as_str()) {
            Some(output) => output.to_string(),
            None => return self.miss(),
        };
        // refresh the access marker for TTL and eviction ordering
        let _ = fs::File::options()
            .append(true)
            .open(&path)
            .and_then(|file| file.set_modified(SystemTime::now()));
        lock(&self.counters).hits += 1;
        Some(output)
    }

    fn put(&self, key: &str, output: &str, marker: ModMarker) {
        if self.entry_files().len() >= self.max_size {
            self.evict_oldest();
        }
        let entry = serde_json::json!({
            "key": key,
            "output": output,
            "marker": marker,
        });
        if let Ok(raw) = serde_json::to_string(&entry) {
            let _ = fs::write(self.entry_path(key), raw);
        }
    }

    fn invalidate(&self, template_fp: &str) {
        let prefix = format!("{template_fp}{KEY_SEPARATOR}");
        for path in self.entry_files() {
            let matches = self
                .read_entry(&path)
                .and_then(|entry| {
                    entry
                        .get("key")
                        .and_then(|k| k.as_str())
                        .map(|k| k.starts_with(&prefix))
                })
                .unwrap_or(true);
            if matches {
                let _ = fs::remove_file(path);
            }
        }
    }

    fn clear(&self) {
        for path in self.entry_files() {
            let _ = fs::remove_file(path);
        }
    }

    fn stats(&self) -> CacheStats {
        let counters = lock(&self.counters);
        CacheStats {
            size: self.entry_files().len(),
            hits: counters.hits,
            misses: counters.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_invalidation() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), 100).unwrap();

        cache.put("t1:c1", "hello", Some(5));
        assert_eq!(cache.get("t1:c1", Some(5)).as_deref(), Some("hello"));
        // marker mismatch evicts
        assert_eq!(cache.get("t1:c1", Some(6)), None);
        assert_eq!(cache.get("t1:c1", Some(5)), None);
    }

    #[test]
    fn test_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = DiskCache::new(dir.path(), 100).unwrap();
            cache.put("t1:c1", "persisted", None);
        }
        let cache = DiskCache::new(dir.path(), 100).unwrap();
        assert_eq!(cache.get("t1:c1", None).as_deref(), Some("persisted"));
    }

    #[test]
    fn test_invalidate_by_template() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), 100).unwrap();
        cache.put("t1:c1", "a", None);
        cache.put("t1:c2", "b", None);
        cache.put("t2:c1", "c", None);
        cache.invalidate("t1");
        assert_eq!(cache.get("t1:c1", None), None);
        assert_eq!(cache.get("t2:c1", None).as_deref(), Some("c"));
    }

    #[test]
    fn test_capacity_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path(), 2).unwrap();
        cache.put("a:1", "A", None);
        cache.put("b:1", "B", None);
        cache.put("c:1", "C", None);
        assert_eq!(cache.stats().size, 2);
    }
}
