use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::Write;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};

use sha2::{Digest, Sha256};

/// Hex encoded sha-256 of some content.
pub fn fingerprint(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    let mut rv = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(rv, "{byte:02x}");
    }
    rv
}

const MEMO_LIMIT: usize = 10_000;

/// Memoizes fingerprints of recently seen content.
///
/// The memo key is a cheap 64-bit hash of the content, so repeated renders
/// of an unchanged template or context skip the sha-256 pass.  The map is
/// bounded; once it fills up it is reset rather than evicted piecemeal.
#[derive(Default)]
pub struct FingerprintCache {
    entries: Mutex<HashMap<u64, Arc<str>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl FingerprintCache {
    pub fn of(&self, content: &str) -> Arc<str> {
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        let quick = hasher.finish();

        let mut entries = lock(&self.entries);
        if let Some(hit) = entries.get(&quick) {
            return hit.clone();
        }
        if entries.len() >= MEMO_LIMIT {
            entries.clear();
        }
        let rv: Arc<str> = fingerprint(content.as_bytes()).into();
        entries.insert(quick, rv.clone());
        rv
    }
}
