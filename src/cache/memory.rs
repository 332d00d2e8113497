use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::cache::{CacheStats, ModMarker, RenderCache, KEY_SEPARATOR};

struct Entry {
    output: String,
    marker: ModMarker,
    last_access: Instant,
}

struct State {
    entries: HashMap<String, Entry>,
    hits: u64,
    misses: u64,
}

/// Bounded in-memory render cache.
///
/// Eviction is least-recently-accessed when an insertion would exceed
/// capacity.  An optional time-to-live expires entries that have not been
/// touched for the configured duration.
pub struct MemoryCache {
    state: Mutex<State>,
    max_size: usize,
    ttl: Option<Duration>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryCache {
    /// Creates a cache holding up to `max_size` entries.
    pub fn new(max_size: usize) -> MemoryCache {
        MemoryCache {
            state: Mutex::new(State {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            max_size: max_size.max(1),
            ttl: None,
        }
    }

    /// Expires entries untouched for this long.
    pub fn with_ttl(mut self, ttl: Duration) -> MemoryCache {
        self.ttl = if ttl.is_zero() { None } else { Some(ttl) };
        self
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        match self.ttl {
            Some(ttl) => entry.last_access.elapsed() > ttl,
            None => false,
        }
    }
}

impl RenderCache for MemoryCache {
    fn get(&self, key: &str, marker: ModMarker) -> Option<String> {
        let mut state = lock(&self.state);
        let stale = match state.entries.get(key) {
            None => {
                state.misses += 1;
                return None;
            }
            Some(entry) => self.is_expired(entry) || entry.marker != marker,
        };
        if stale {
            state.entries.remove(key);
            state.misses += 1;
            return None;
        }
        state.hits += 1;
        let entry = state.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        Some(entry.output.clone())
    }

    fn put(&self, key: &str, output: &str, marker: ModMarker) {
        let mut state = lock(&self.state);
        if state.entries.len() >= self.max_size && !state.entries.contains_key(key) {
            let lru = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(key, _)| key.clone());
            if let Some(lru) = lru {
                state.entries.remove(&lru);
            }
        }
        state.entries.insert(
            key.to_string(),
            Entry {
                output: output.to_string(),
                marker,
                last_access: Instant::now(),
            },
        );
    }

    fn invalidate(&self, template_fp: &str) {
        let prefix = format!("{template_fp}{KEY_SEPARATOR}");
        let mut state = lock(&self.state);
        state.entries.retain(|key, _| !key.starts_with(&prefix));
    }

    fn clear(&self) {
        lock(&self.state).entries.clear();
    }

    fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        CacheStats {
            size: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_marker_mismatch() {
        let cache = MemoryCache::new(10);
        cache.put("t1:c1", "output", Some(100));
        assert_eq!(cache.get("t1:c1", Some(100)).as_deref(), Some("output"));
        // a changed modification marker invalidates the entry
        assert_eq!(cache.get("t1:c1", Some(200)), None);
        assert_eq!(cache.get("t1:c1", Some(100)), None);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        cache.put("a:1", "A", None);
        cache.put("b:1", "B", None);
        assert!(cache.get("a:1", None).is_some());
        cache.put("c:1", "C", None);
        // b was least recently accessed
        assert_eq!(cache.get("b:1", None), None);
        assert!(cache.get("a:1", None).is_some());
        assert!(cache.get("c:1", None).is_some());
    }

    #[test]
    fn test_invalidate_by_template() {
        let cache = MemoryCache::new(10);
        cache.put("t1:c1", "a", None);
        cache.put("t1:c2", "b", None);
        cache.put("t2:c1", "c", None);
        cache.invalidate("t1");
        assert_eq!(cache.stats().size, 1);
        assert!(cache.get("t2:c1", None).is_some());
    }

    #[test]
    fn test_stats() {
        let cache = MemoryCache::new(10);
        cache.put("t:c", "x", None);
        cache.get("t:c", None);
        cache.get("missing:c", None);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }
}
