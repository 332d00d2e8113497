//! Render output caching.
//!
//! Two interchangeable backends sit behind [`RenderCache`]: a bounded
//! in-memory map with LRU eviction and an on-disk store that survives
//! restarts.  Entries are keyed by the template fingerprint, the context
//! fingerprint, and the template name, so the same template rendered with
//! different data occupies separate slots.  When modification tracking is on, a stored
//! entry also remembers the template file's modification marker; a lookup
//! whose current marker differs is a miss and evicts the stale entry.

mod disk;
mod fingerprint;
mod memory;

pub use self::disk::DiskCache;
pub use self::fingerprint::{fingerprint, FingerprintCache};
pub use self::memory::MemoryCache;

/// Separator between the key components.
pub(crate) const KEY_SEPARATOR: char = ':';

/// The template file's modification time at store time, in milliseconds
/// since the epoch.  `None` when modification tracking is off.
pub type ModMarker = Option<u64>;

/// Joins the fingerprints and a namespace into a cache key.
///
/// The template fingerprint leads so [`RenderCache::invalidate`] can drop
/// every entry for one template by prefix.  The namespace (typically the
/// template name) keeps entries from same-content templates distinct.
pub fn cache_key(template_fp: &str, context_fp: &str, namespace: &str) -> String {
    format!("{template_fp}{KEY_SEPARATOR}{context_fp}{KEY_SEPARATOR}{namespace}")
}

/// Counters reported by [`RenderCache::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in percent over all requests so far.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64 * 100.0
        }
    }
}

/// Contract shared by the cache backends.
///
/// Implementations serialize their own mutation internally so concurrent
/// renders can share one cache.
pub trait RenderCache: Send + Sync {
    /// Looks up a rendered output.  `marker` is the template's current
    /// modification marker; a mismatch with the stored one is a miss.
    fn get(&self, key: &str, marker: ModMarker) -> Option<String>;

    /// Stores a rendered output under the key.
    fn put(&self, key: &str, output: &str, marker: ModMarker);

    /// Drops every entry whose key starts with the given template
    /// fingerprint, regardless of context.
    fn invalidate(&self, template_fp: &str);

    /// Drops everything.
    fn clear(&self);

    fn stats(&self) -> CacheStats;
}
