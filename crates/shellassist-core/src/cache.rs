//! TTL- and capacity-bounded in-memory response cache, keyed by a 128-bit
//! fingerprint of the request-defining parts. Keeping the request `kind` as
//! the first key component makes cache collisions across kinds impossible.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

const CAPACITY: usize = 200;
const TTL: Duration = Duration::from_secs(60);

struct CacheEntry {
    value: String,
    inserted_at: Instant,
}

/// Compute a 128-bit hex fingerprint for cache keys, joining parts with `|`.
pub fn fingerprint(parts: &[&str]) -> String {
    let joined = parts.join("|");
    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(&digest[..16])
}

/// In-memory TTL cache. Not LRU — natural TTL churn plus a capacity sweep on
/// insert suffices, per spec.
#[derive(Default)]
pub struct Cache {
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Look up a value by key parts. Removes the entry if stale.
    pub fn get(&mut self, parts: &[&str]) -> Option<String> {
        let key = fingerprint(parts);
        let stale = match self.entries.get(&key) {
            Some(entry) => entry.inserted_at.elapsed() > TTL,
            None => return None,
        };
        if stale {
            self.entries.remove(&key);
            return None;
        }
        self.entries.get(&key).map(|e| e.value.clone())
    }

    /// Insert a value. When the cache exceeds capacity afterward, sweep all
    /// expired entries in one pass.
    pub fn set(&mut self, parts: &[&str], value: String) {
        let key = fingerprint(parts);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        if self.entries.len() > CAPACITY {
            self.evict_expired();
        }
    }

    fn evict_expired(&mut self) {
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() <= TTL);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
