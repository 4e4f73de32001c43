//! Cache abstraction layer for identity resolution
//!
//! Provides pluggable cache backends with a unified async interface.
//!
//! # Available Backends
//!
//! - [`InMemoryCache`] - Thread-safe in-memory cache with TTL support. With
//!   caching turned off, [`InMemoryCache::disabled`] retains nothing.
//!
//! # Observability
//!
//! [`TracedCache`] adds a span per operation. It logs the provider of an
//! identity key, never the subject.
//!
//! # Consistency
//!
//! Only positive resolutions are cached. Link writes through to the cache and
//! unlink drops the whole [`CacheNamespace::Identity`] namespace, so a resolve
//! that follows either observes the new state.

mod config;
mod error;
mod key;
mod memory;
mod provider;
mod traced;

use std::sync::Arc;

pub use config::{
    CacheBackend, CacheConfig, DEFAULT_IDENTITY_TTL, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_VALUE_SIZE,
};
pub use error::{CacheError, CacheResult};
pub use key::{CacheKey, CacheNamespace};
pub use memory::InMemoryCache;
pub use provider::{CacheProvider, CacheStats};
pub use traced::TracedCache;

/// Create a cache provider based on configuration
#[must_use]
pub fn create_cache(config: &CacheConfig, service_name: &str) -> Arc<dyn CacheProvider> {
    if !config.enabled {
        return Arc::new(InMemoryCache::disabled());
    }

    match config.backend {
        CacheBackend::Noop => Arc::new(InMemoryCache::disabled()),
        CacheBackend::Memory => {
            let mut cache = InMemoryCache::new()
                .with_default_ttl(config.identity_ttl)
                .with_max_value_size(config.max_value_size);

            if let Some(max) = config.max_entries {
                cache = cache.with_max_entries(max);
            }

            Arc::new(TracedCache::new(cache, service_name))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_disabled_never_stores() {
        let cache = create_cache(&CacheConfig::disabled(), "test");
        let key = CacheKey::identity("keycloak", "abc");

        cache.set(&key, b"user", None).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
        assert_eq!(cache.stats().await.entry_count, Some(0));
    }

    #[tokio::test]
    async fn test_create_cache_noop_backend() {
        let config = CacheConfig {
            backend: CacheBackend::Noop,
            ..CacheConfig::new()
        };
        let cache = create_cache(&config, "test");
        let key = CacheKey::identity("keycloak", "abc");

        cache.set(&key, b"user", None).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_cache_memory_functional() {
        let cache = create_cache(&CacheConfig::new(), "test");
        let key = CacheKey::identity("keycloak", "abc");

        cache.set(&key, b"user", None).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_cache_memory_enforces_value_size() {
        let config = CacheConfig {
            max_value_size: 16,
            ..CacheConfig::new()
        };
        let cache = create_cache(&config, "test");
        let key = CacheKey::identity("keycloak", "abc");

        assert!(cache.set(&key, &[0u8; 16], None).await.is_ok());
        assert!(cache.set(&key, &[0u8; 17], None).await.is_err());
    }
}
