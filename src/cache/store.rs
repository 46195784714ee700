//! In-memory outcome stores.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::outcome::{CacheKey, CachedOutcome};

/// A keyed outcome store shared by every in-flight request.
///
/// Implementations are synchronous: lookups never wait on I/O, and locks
/// are never held across an `.await`.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CachedOutcome>;
    fn put(&self, key: CacheKey, outcome: CachedOutcome);
    fn len(&self) -> usize;
    fn name(&self) -> &'static str;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keeps every outcome for the life of the process. Concurrent writers to
/// the same key overwrite each other; the last write wins.
#[derive(Default)]
pub struct UnboundedCache {
    entries: RwLock<HashMap<CacheKey, CachedOutcome>>,
}

impl UnboundedCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for UnboundedCache {
    fn get(&self, key: &CacheKey) -> Option<CachedOutcome> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn put(&self, key: CacheKey, outcome: CachedOutcome) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, outcome);
    }

    fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn name(&self) -> &'static str {
        "unbounded"
    }
}

struct Entry {
    outcome: CachedOutcome,
    created_at: Instant,
    last_accessed: Instant,
}

/// Opt-in store with a capacity and/or a time to live.
///
/// Expired entries disappear on read. Inserting into a full store evicts
/// the least recently accessed entry.
pub struct BoundedCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    max_entries: Option<usize>,
    ttl: Option<Duration>,
}

impl BoundedCache {
    pub fn new(max_entries: Option<usize>, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
            ttl,
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.created_at) > ttl)
    }
}

impl CacheStore for BoundedCache {
    fn get(&self, key: &CacheKey) -> Option<CachedOutcome> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = self.is_expired(entries.get(key)?, now);
        if expired {
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.last_accessed = now;
        Some(entry.outcome.clone())
    }

    fn put(&self, key: CacheKey, outcome: CachedOutcome) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, e| !self.is_expired(e, now));

        if let Some(max) = self.max_entries {
            while !entries.contains_key(&key) && entries.len() >= max {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_accessed)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => {
                        tracing::debug!(key = %k, "evicting least recently used entry");
                        entries.remove(&k);
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            key,
            Entry {
                outcome,
                created_at: now,
                last_accessed: now,
            },
        );
    }

    fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|e| !self.is_expired(e, now))
            .count()
    }

    fn name(&self) -> &'static str {
        "bounded"
    }
}

/// Stores nothing. Used when caching is switched off.
#[derive(Default)]
pub struct NullCache;

impl CacheStore for NullCache {
    fn get(&self, _: &CacheKey) -> Option<CachedOutcome> {
        None
    }

    fn put(&self, _: CacheKey, _: CachedOutcome) {}

    fn len(&self) -> usize {
        0
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(body: &str) -> CachedOutcome {
        CachedOutcome::Rendered {
            status: 200,
            content_type: "text/plain".into(),
            body: body.into(),
        }
    }

    fn key(url: &str) -> CacheKey {
        CacheKey::new(url, "ris")
    }

    #[test]
    fn unbounded_keeps_everything_and_last_write_wins() {
        let cache = UnboundedCache::new();
        assert!(cache.is_empty());
        for i in 0..100 {
            cache.put(key(&format!("u{i}")), outcome("x"));
        }
        cache.put(key("u0"), outcome("second"));
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get(&key("u0")), Some(outcome("second")));
        assert_eq!(cache.get(&CacheKey::new("u0", "doi")), None);
    }

    #[test]
    fn bounded_evicts_least_recently_accessed() {
        let cache = BoundedCache::new(Some(2), None);
        cache.put(key("a"), outcome("a"));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(key("b"), outcome("b"));
        std::thread::sleep(Duration::from_millis(2));
        // touch "a" so "b" becomes the eviction candidate
        assert!(cache.get(&key("a")).is_some());
        std::thread::sleep(Duration::from_millis(2));
        cache.put(key("c"), outcome("c"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_some());
        assert!(cache.get(&key("b")).is_none());
        assert!(cache.get(&key("c")).is_some());
    }

    #[test]
    fn bounded_overwrite_at_capacity_does_not_evict() {
        let cache = BoundedCache::new(Some(1), None);
        cache.put(key("a"), outcome("1"));
        cache.put(key("a"), outcome("2"));
        assert_eq!(cache.get(&key("a")), Some(outcome("2")));
    }

    #[test]
    fn bounded_expires_after_ttl() {
        let cache = BoundedCache::new(None, Some(Duration::from_millis(20)));
        cache.put(key("a"), outcome("a"));
        assert!(cache.get(&key("a")).is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn null_cache_never_stores() {
        let cache = NullCache;
        cache.put(key("a"), outcome("a"));
        assert!(cache.get(&key("a")).is_none());
        assert!(cache.is_empty());
    }
}
