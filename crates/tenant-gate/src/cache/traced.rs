//! Logging wrapper for cache backends

use std::time::Duration;

use async_trait::async_trait;
use tracing::{Instrument, Span};

use super::error::CacheResult;
use super::key::CacheKey;
use super::provider::{CacheProvider, CacheStats};

/// Wraps a cache with one span per operation
///
/// Identity keys embed the external subject, so spans and events record the
/// key namespace and provider only. The full key is never logged.
#[derive(Debug, Clone)]
pub struct TracedCache<C> {
    inner: C,
    service_name: String,
}

impl<C> TracedCache<C> {
    pub fn new(cache: C, service_name: impl Into<String>) -> Self {
        Self {
            inner: cache,
            service_name: service_name.into(),
        }
    }

    fn span(&self, operation: &'static str, key: &CacheKey) -> Span {
        tracing::debug_span!(
            "identity_cache",
            service = %self.service_name,
            operation,
            namespace = key.namespace().as_str(),
            provider = key.scope(),
        )
    }
}

/// Failures degrade resolution to store reads, so they surface at warn
fn report<T>(operation: &'static str, result: &CacheResult<T>) {
    if let Err(e) = result {
        tracing::warn!(operation, error = %e, "Identity cache operation failed");
    }
}

#[async_trait]
impl<C: CacheProvider> CacheProvider for TracedCache<C> {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let span = self.span("get", key);
        let result = self.inner.get(key).instrument(span.clone()).await;
        if let Ok(found) = &result {
            span.in_scope(|| tracing::debug!(hit = found.is_some(), "lookup"));
        }
        report("get", &result);
        result
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let span = self.span("set", key);
        let result = self
            .inner
            .set(key, value, ttl)
            .instrument(span.clone())
            .await;
        if result.is_ok() {
            span.in_scope(|| tracing::debug!(ttl_secs = ttl.map(|d| d.as_secs()), "stored"));
        }
        report("set", &result);
        result
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        let result = self.inner.delete(key).instrument(self.span("delete", key)).await;
        report("delete", &result);
        result
    }

    async fn delete_by_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let span = tracing::debug_span!(
            "identity_cache",
            service = %self.service_name,
            operation = "invalidate",
            prefix,
        );
        let result = self
            .inner
            .delete_by_prefix(prefix)
            .instrument(span.clone())
            .await;
        if let Ok(count) = &result {
            span.in_scope(|| tracing::debug!(count, "invalidated"));
        }
        report("invalidate", &result);
        result
    }

    async fn health_check(&self) -> CacheResult<()> {
        let span = tracing::debug_span!("identity_cache", operation = "health_check");
        let result = self.inner.health_check().instrument(span).await;
        report("health_check", &result);
        result
    }

    async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::super::memory::InMemoryCache;
    use super::*;

    #[tokio::test]
    async fn test_traced_cache_passes_through() {
        let traced = TracedCache::new(InMemoryCache::new(), "test-service");
        let key = CacheKey::identity("keycloak", "abc");

        assert!(traced.get(&key).await.unwrap().is_none());
        traced.set(&key, b"user", None).await.unwrap();
        assert_eq!(traced.get(&key).await.unwrap(), Some(b"user".to_vec()));
        assert_eq!(traced.delete_by_prefix("ident:").await.unwrap(), 1);
        assert!(!traced.delete(&key).await.unwrap());
        assert!(traced.health_check().await.is_ok());

        let stats = traced.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_subject_stays_out_of_logs() {
        let traced = TracedCache::new(InMemoryCache::new(), "test-service");
        let key = CacheKey::identity("keycloak", "subject-7f3a");

        traced.set(&key, b"user", None).await.unwrap();
        traced.get(&key).await.unwrap();
        traced.delete(&key).await.unwrap();

        assert!(logs_contain("keycloak"));
        assert!(logs_contain("hit=true"));
        assert!(!logs_contain("subject-7f3a"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_backend_failure_logged_at_warn() {
        let traced = TracedCache::new(InMemoryCache::new().with_max_value_size(4), "test-service");
        let key = CacheKey::identity("keycloak", "abc");

        assert!(traced.set(&key, &[0u8; 8], None).await.is_err());
        assert!(logs_contain("Identity cache operation failed"));
        assert!(logs_contain("WARN"));
    }
}
