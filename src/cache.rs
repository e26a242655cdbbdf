//! Time-boxed memoization for aggregation reads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

/// A read-through cache with one fixed TTL per instance, keyed by a
/// composite string. Expiry is lazy: a stale entry is dropped when it is
/// next read, and `set` simply overwrites. Every consumer must tolerate
/// a miss by recomputing from the data store; the cache only bounds
/// latency, it is never the system of record.
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<T>>>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: T) {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(
            key.into(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_within_ttl() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("composite:7:0912", 82.86_f64);
        assert_eq!(cache.get("composite:7:0912"), Some(82.86));
        assert_eq!(cache.get("composite:7:0913"), None);
    }

    #[test]
    fn stale_entry_is_dropped_on_read() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.set("participation:7", 60.0_f64);
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("participation:7"), None);
    }

    #[test]
    fn set_overwrites_existing_value() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.set("period:7", "2025-A".to_string());
        cache.set("period:7", "2025-B".to_string());
        assert_eq!(cache.get("period:7"), Some("2025-B".to_string()));
    }
}
