//! Result cache: memoized outcomes per `(url, format)`.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResultCache`] | Process-wide cache handle that applies the error-caching policy |
//! | [`CacheStore`] | Trait for storage backends |
//! | [`UnboundedCache`] | Default backend: no eviction, no expiry |
//! | [`BoundedCache`] | Opt-in backend with capacity and/or TTL |
//! | [`NullCache`] | Backend used when caching is disabled |
//! | [`CacheKey`], [`CachedOutcome`] | Key and tagged value types |
//!
//! Once a key holds an outcome, the default backend returns it for every
//! later request until the process exits. That includes failures, unless
//! `cache_errors` is switched off.

mod outcome;
mod store;

use std::sync::Arc;

pub use outcome::{CacheKey, CachedOutcome, TEXT_PLAIN};
pub use store::{BoundedCache, CacheStore, NullCache, UnboundedCache};

use crate::config::CacheConfig;

/// Shared handle over a [`CacheStore`] plus the policy deciding which
/// outcomes are stored.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn CacheStore>,
    cache_errors: bool,
}

impl ResultCache {
    pub fn new(store: Arc<dyn CacheStore>, cache_errors: bool) -> Self {
        Self {
            store,
            cache_errors,
        }
    }

    /// Picks the backend described by `config`.
    pub fn from_config(config: &CacheConfig) -> Self {
        let store: Arc<dyn CacheStore> = if !config.enabled {
            Arc::new(NullCache)
        } else if config.is_bounded() {
            Arc::new(BoundedCache::new(config.max_entries, config.ttl))
        } else {
            Arc::new(UnboundedCache::new())
        };
        let cache = Self::new(store, config.cache_errors);
        tracing::info!(
            backend = cache.backend(),
            cache_errors = config.cache_errors,
            "result cache ready"
        );
        cache
    }

    pub fn get(&self, key: &CacheKey) -> Option<CachedOutcome> {
        self.store.get(key)
    }

    /// Stores `outcome` unless it is a failure and failures are not cached.
    /// Returns whether it was handed to the backend.
    pub fn put(&self, key: CacheKey, outcome: CachedOutcome) -> bool {
        if outcome.is_failure() && !self.cache_errors {
            return false;
        }
        self.store.put(key, outcome);
        true
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn backend(&self) -> &'static str {
        self.store.name()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn failure() -> CachedOutcome {
        CachedOutcome::UpstreamFailure {
            message: "boom".into(),
        }
    }

    #[test]
    fn from_config_picks_backend() {
        let mut config = CacheConfig::default();
        assert_eq!(ResultCache::from_config(&config).backend(), "unbounded");

        config.ttl = Some(Duration::from_secs(1));
        assert_eq!(ResultCache::from_config(&config).backend(), "bounded");

        config.enabled = false;
        assert_eq!(ResultCache::from_config(&config).backend(), "disabled");
    }

    #[test]
    fn failures_are_cached_by_default() {
        let cache = ResultCache::default();
        let key = CacheKey::new("u", "ris");
        assert!(cache.put(key.clone(), failure()));
        assert_eq!(cache.get(&key), Some(failure()));
    }

    #[test]
    fn failures_skipped_when_error_caching_is_off() {
        let cache = ResultCache::new(Arc::new(UnboundedCache::new()), false);
        let key = CacheKey::new("u", "doi");
        assert!(!cache.put(key.clone(), failure()));
        assert!(!cache.put(key.clone(), CachedOutcome::DoiNotFound));
        assert!(cache.get(&key).is_none());

        let ok = CachedOutcome::Rendered {
            status: 200,
            content_type: TEXT_PLAIN.into(),
            body: "10.1/x".into(),
        };
        assert!(cache.put(key.clone(), ok.clone()));
        assert_eq!(cache.get(&key), Some(ok));
        assert_eq!(cache.len(), 1);
    }
}
