//! Result cache with a freshness window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

struct CacheEntry {
    value: Value,
    stored_at: Instant,
}

/// Memoized results keyed by function name and arguments.
///
/// Values are held as JSON so one cache serves every result type. Any write
/// to the store calls [`ResultCache::invalidate_all`].
pub struct ResultCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh cached value for `key`, or the result of `compute` (then cached).
    pub fn get_or_compute<T, F>(&mut self, key: &str, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(entry) = self.entries.get(key) {
            if entry.stored_at.elapsed() < self.ttl {
                match serde_json::from_value(entry.value.clone()) {
                    Ok(value) => {
                        debug!(key, "cache hit");
                        return value;
                    }
                    Err(e) => warn!(key, error = %e, "cached value has wrong shape, recomputing"),
                }
            }
        }

        let value = compute();
        match serde_json::to_value(&value) {
            Ok(json) => {
                self.entries.insert(
                    key.to_string(),
                    CacheEntry {
                        value: json,
                        stored_at: Instant::now(),
                    },
                );
            }
            Err(e) => warn!(key, error = %e, "result not cacheable"),
        }
        value
    }

    /// Drop everything.
    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "cache invalidated");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache key for a function and its arguments.
pub fn cache_key(function: &str, args: &[&str]) -> String {
    let mut key = function.to_string();
    for arg in args {
        key.push('|');
        key.push_str(arg);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_hit_within_window() {
        let mut cache = ResultCache::new(Duration::from_secs(300));
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            vec![1u64, 2, 3]
        };

        let a: Vec<u64> = cache.get_or_compute("metrics|ALL", compute);
        let b: Vec<u64> = cache.get_or_compute("metrics|ALL", compute);
        assert_eq!(a, b);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_expired_entry_recomputed() {
        let mut cache = ResultCache::new(Duration::ZERO);
        let calls = Cell::new(0);
        for _ in 0..2 {
            let _: u32 = cache.get_or_compute("k", || {
                calls.set(calls.get() + 1);
                7
            });
        }
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_invalidate_all() {
        let mut cache = ResultCache::new(Duration::from_secs(300));
        let _: u32 = cache.get_or_compute("a", || 1);
        let _: u32 = cache.get_or_compute("b", || 2);
        assert_eq!(cache.len(), 2);

        cache.invalidate_all();
        assert!(cache.is_empty());
        let again: u32 = cache.get_or_compute("a", || 10);
        assert_eq!(again, 10);
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("metrics", &["GOIANIA"]), "metrics|GOIANIA");
        assert_eq!(cache_key("catalog", &[]), "catalog");
    }
}
