//! Cache-aside resolution of external identities to internal users

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::{IdentityError, IdentityResult};
use super::types::{CacheStatus, IdentityMapping, UserId};
use crate::cache::{CacheKey, CacheNamespace, CacheProvider, DEFAULT_IDENTITY_TTL};
use crate::store::{IdentityMappingStore, StoreError, UnlinkOutcome};

/// Maps (provider, subject) pairs to internal user ids
///
/// Resolution reads through the cache. Only hits against the store are
/// cached, so an identity linked after a failed resolve is usable at once.
/// Cache failures degrade to store reads and never fail an operation.
///
/// Every unlink bumps a generation counter. A resolve that observes a bump
/// while it was reading the store drops the entry it just cached, so a
/// mapping removed mid-resolve is never served from the cache.
#[derive(Clone)]
pub struct IdentityResolver {
    store: Arc<dyn IdentityMappingStore>,
    cache: Arc<dyn CacheProvider>,
    ttl: Duration,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityMappingStore>, cache: Arc<dyn CacheProvider>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_IDENTITY_TTL,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Resolve an external identity to its internal user
    pub async fn resolve(&self, provider: &str, subject: &str) -> IdentityResult<UserId> {
        let key = CacheKey::identity(provider, subject);

        match self.cache.get(&key).await {
            Ok(Some(bytes)) => {
                if let Some(user_id) = UserId::from_bytes(&bytes) {
                    return Ok(user_id);
                }
                warn!(provider, "Dropping undecodable identity cache entry");
                self.evict(&key).await;
            }
            Ok(None) => {}
            Err(e) => debug!(provider, error = %e, "Identity cache read failed, using store"),
        }

        let generation = self.generation.load(Ordering::Acquire);
        let mapping = self
            .store
            .find(provider, subject)
            .await?
            .ok_or_else(|| IdentityError::NotFound {
                provider: provider.to_string(),
            })?;

        self.cache_user(&key, mapping.user_id).await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(provider, "Identity unlinked during resolve, dropping cache entry");
            self.evict(&key).await;
        }
        Ok(mapping.user_id)
    }

    /// Link an external identity to `user_id`
    ///
    /// Re-linking the same pair to the same user returns the existing mapping.
    /// Fails with `Conflict` when the pair belongs to another user, or when the
    /// user already holds a different subject for `provider`.
    pub async fn link(
        &self,
        user_id: UserId,
        provider: &str,
        subject: &str,
    ) -> IdentityResult<IdentityMapping> {
        if let Some(existing) = self.store.find(provider, subject).await? {
            return self.accept_existing(existing, user_id, provider).await;
        }

        let held = self.store.find_by_user(user_id).await?;
        if held.iter().any(|m| m.provider == provider) {
            return Err(IdentityError::Conflict(format!(
                "user already has a linked {provider} identity"
            )));
        }

        let mapping = IdentityMapping::new(user_id, provider, subject);
        match self.store.insert(mapping.clone()).await {
            Ok(()) => {}
            Err(StoreError::ProviderLinked(_)) => {
                return Err(IdentityError::Conflict(format!(
                    "user already has a linked {provider} identity"
                )));
            }
            // Lost a race with a concurrent link of the same pair
            Err(StoreError::Duplicate(_)) => {
                let existing = self.store.find(provider, subject).await?.ok_or_else(|| {
                    IdentityError::Conflict(format!("{provider} identity is being modified"))
                })?;
                return self.accept_existing(existing, user_id, provider).await;
            }
            Err(e) => return Err(e.into()),
        }

        self.cache_user(&CacheKey::identity(provider, subject), user_id)
            .await;
        info!(%user_id, provider, "Linked identity");
        Ok(mapping)
    }

    /// Remove the user's identity for `provider`
    ///
    /// The last remaining provider of a user can never be unlinked; the store
    /// checks and deletes in one step.
    pub async fn unlink(&self, user_id: UserId, provider: &str) -> IdentityResult<()> {
        match self.store.delete_unless_last(user_id, provider).await? {
            UnlinkOutcome::Removed => {}
            UnlinkOutcome::NotLinked => {
                return Err(IdentityError::NotFound {
                    provider: provider.to_string(),
                });
            }
            UnlinkOutcome::LastIdentity => {
                return Err(IdentityError::Conflict(
                    "cannot unlink the last linked identity".to_string(),
                ));
            }
        }

        self.generation.fetch_add(1, Ordering::AcqRel);

        if let Err(e) = self
            .cache
            .delete_by_prefix(&CacheNamespace::Identity.prefix())
            .await
        {
            warn!(error = %e, "Identity cache invalidation failed");
        }

        info!(%user_id, provider, "Unlinked identity");
        Ok(())
    }

    /// Provider names linked to the user, sorted; read straight from the store
    pub async fn linked_providers(&self, user_id: UserId) -> IdentityResult<Vec<String>> {
        let mut providers: Vec<String> = self
            .store
            .find_by_user(user_id)
            .await?
            .into_iter()
            .map(|m| m.provider)
            .collect();
        providers.sort();
        providers.dedup();
        Ok(providers)
    }

    /// Identity cache health and counters
    pub async fn cache_status(&self) -> CacheStatus {
        let healthy = match self.cache.health_check().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Identity cache health check failed");
                false
            }
        };
        let stats = self.cache.stats().await;
        CacheStatus {
            healthy,
            hits: stats.hits,
            misses: stats.misses,
            entries: stats.entry_count,
        }
    }

    async fn accept_existing(
        &self,
        existing: IdentityMapping,
        user_id: UserId,
        provider: &str,
    ) -> IdentityResult<IdentityMapping> {
        if existing.user_id != user_id {
            return Err(IdentityError::Conflict(format!(
                "{provider} identity is already linked to another account"
            )));
        }
        self.cache_user(
            &CacheKey::identity(&existing.provider, &existing.subject),
            user_id,
        )
        .await;
        Ok(existing)
    }

    async fn evict(&self, key: &CacheKey) {
        if let Err(e) = self.cache.delete(key).await {
            debug!(error = %e, "Identity cache delete failed");
        }
    }

    async fn cache_user(&self, key: &CacheKey, user_id: UserId) {
        if let Err(e) = self.cache.set(key, &user_id.to_bytes(), Some(self.ttl)).await {
            debug!(error = %e, "Identity cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use tokio::sync::{Notify, oneshot};

    use crate::cache::{CacheError, CacheResult, CacheStats, InMemoryCache};
    use crate::store::{InMemoryStore, StoreResult};

    fn resolver() -> (IdentityResolver, InMemoryStore, InMemoryCache) {
        let store = InMemoryStore::new();
        let cache = InMemoryCache::new();
        let resolver = IdentityResolver::new(Arc::new(store.clone()), Arc::new(cache.clone()));
        (resolver, store, cache)
    }

    /// Cache that fails every operation
    struct BrokenCache;

    #[async_trait]
    impl CacheProvider for BrokenCache {
        async fn get(&self, _key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
            Err(CacheError::Connection("down".to_string()))
        }

        async fn set(&self, _key: &CacheKey, _value: &[u8], _ttl: Option<Duration>) -> CacheResult<()> {
            Err(CacheError::Connection("down".to_string()))
        }

        async fn delete(&self, _key: &CacheKey) -> CacheResult<bool> {
            Err(CacheError::Timeout)
        }

        async fn delete_by_prefix(&self, _prefix: &str) -> CacheResult<u64> {
            Err(CacheError::Timeout)
        }

        async fn health_check(&self) -> CacheResult<()> {
            Err(CacheError::Timeout)
        }

        async fn stats(&self) -> CacheStats {
            CacheStats::default()
        }
    }

    #[tokio::test]
    async fn test_resolve_not_found_is_not_cached() {
        let (resolver, store, cache) = resolver();
        let user = UserId::new_random();

        let err = resolver.resolve("keycloak", "abc").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(cache.stats().await.sets, 0);

        resolver.link(user, "keycloak", "abc").await.unwrap();
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
        assert_eq!(store.mapping_lookups(), 2);
    }

    #[tokio::test]
    async fn test_resolve_reads_through_cache() {
        let (resolver, store, _cache) = resolver();
        let user = UserId::new_random();
        store
            .insert(IdentityMapping::new(user, "keycloak", "abc"))
            .await
            .unwrap();

        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);

        assert_eq!(store.mapping_lookups(), 1);
    }

    #[tokio::test]
    async fn test_resolve_drops_undecodable_cache_entry() {
        let (resolver, store, cache) = resolver();
        let user = UserId::new_random();
        store
            .insert(IdentityMapping::new(user, "keycloak", "abc"))
            .await
            .unwrap();
        cache
            .set(&CacheKey::identity("keycloak", "abc"), b"garbage", None)
            .await
            .unwrap();

        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
        assert_eq!(store.mapping_lookups(), 1);
        assert_eq!(
            cache.get(&CacheKey::identity("keycloak", "abc")).await.unwrap(),
            Some(user.to_bytes().to_vec())
        );

        // Repaired entry serves the next resolve
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
        assert_eq!(store.mapping_lookups(), 1);
        assert_eq!(cache.stats().await.deletes, 1);
    }

    #[tokio::test]
    async fn test_broken_cache_degrades_to_store() {
        let store = InMemoryStore::new();
        let resolver = IdentityResolver::new(Arc::new(store.clone()), Arc::new(BrokenCache));
        let user = UserId::new_random();

        resolver.link(user, "keycloak", "abc").await.unwrap();
        resolver.link(user, "google", "xyz").await.unwrap();
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
        resolver.unlink(user, "google").await.unwrap();
        assert!(resolver.resolve("google", "xyz").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_link_is_idempotent() {
        let (resolver, store, _cache) = resolver();
        let user = UserId::new_random();

        let first = resolver.link(user, "keycloak", "abc").await.unwrap();
        let second = resolver.link(user, "keycloak", "abc").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count_by_user(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_link_pair_owned_by_other_user_conflicts() {
        let (resolver, _store, _cache) = resolver();
        let owner = UserId::new_random();
        let intruder = UserId::new_random();

        resolver.link(owner, "keycloak", "abc").await.unwrap();
        let err = resolver.link(intruder, "keycloak", "abc").await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), owner);
    }

    #[tokio::test]
    async fn test_link_second_subject_for_same_provider_conflicts() {
        let (resolver, _store, _cache) = resolver();
        let user = UserId::new_random();

        resolver.link(user, "keycloak", "abc").await.unwrap();
        let err = resolver.link(user, "keycloak", "other").await.unwrap_err();

        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_unlink_last_identity_conflicts() {
        let (resolver, _store, _cache) = resolver();
        let user = UserId::new_random();

        resolver.link(user, "keycloak", "abc").await.unwrap();
        let err = resolver.unlink(user, "keycloak").await.unwrap_err();

        assert!(err.is_conflict());
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_unlink_unknown_provider_not_found() {
        let (resolver, _store, _cache) = resolver();
        let user = UserId::new_random();

        resolver.link(user, "keycloak", "abc").await.unwrap();
        resolver.link(user, "google", "xyz").await.unwrap();

        assert!(resolver.unlink(user, "github").await.unwrap_err().is_not_found());
        assert!(
            resolver
                .unlink(UserId::new_random(), "keycloak")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_unlink_then_link_flow() {
        let (resolver, _store, _cache) = resolver();
        let user = UserId::new_random();

        resolver.link(user, "keycloak", "abc").await.unwrap();
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
        assert!(resolver.unlink(user, "keycloak").await.unwrap_err().is_conflict());

        resolver.link(user, "google", "xyz").await.unwrap();
        resolver.unlink(user, "keycloak").await.unwrap();

        assert!(resolver.resolve("keycloak", "abc").await.unwrap_err().is_not_found());
        assert_eq!(resolver.resolve("google", "xyz").await.unwrap(), user);
    }

    #[tokio::test]
    async fn test_unlink_invalidates_identity_namespace() {
        let (resolver, _store, cache) = resolver();
        let user = UserId::new_random();
        let other = CacheKey::custom("unrelated", None);
        cache.set(&other, b"keep", None).await.unwrap();

        resolver.link(user, "keycloak", "abc").await.unwrap();
        resolver.link(user, "google", "xyz").await.unwrap();
        resolver.unlink(user, "google").await.unwrap();

        assert!(
            cache
                .get(&CacheKey::identity("keycloak", "abc"))
                .await
                .unwrap()
                .is_none()
        );
        assert!(cache.get(&other).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_linked_providers_sorted() {
        let (resolver, _store, _cache) = resolver();
        let user = UserId::new_random();

        resolver.link(user, "keycloak", "abc").await.unwrap();
        resolver.link(user, "github", "42").await.unwrap();
        resolver.link(user, "google", "xyz").await.unwrap();

        assert_eq!(
            resolver.linked_providers(user).await.unwrap(),
            vec!["github", "google", "keycloak"]
        );
        assert!(
            resolver
                .linked_providers(UserId::new_random())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_concurrent_resolves_without_cache() {
        let store = InMemoryStore::new();
        let resolver =
            IdentityResolver::new(Arc::new(store.clone()), Arc::new(InMemoryCache::disabled()));
        let user = UserId::new_random();
        resolver.link(user, "keycloak", "abc").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let resolver = resolver.clone();
            handles.push(tokio::spawn(async move {
                resolver.resolve("keycloak", "abc").await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), user);
        }
    }

    #[tokio::test]
    async fn test_cache_status() {
        let (resolver, store, _cache) = resolver();
        let user = UserId::new_random();
        store
            .insert(IdentityMapping::new(user, "keycloak", "abc"))
            .await
            .unwrap();

        resolver.resolve("keycloak", "abc").await.unwrap();
        resolver.resolve("keycloak", "abc").await.unwrap();

        let status = resolver.cache_status().await;
        assert!(status.healthy);
        assert_eq!(status.hits, 1);
        assert_eq!(status.misses, 1);
        assert_eq!(status.entries, Some(1));

        let broken = IdentityResolver::new(Arc::new(store), Arc::new(BrokenCache));
        assert!(!broken.cache_status().await.healthy);
    }

    /// Store whose first `find` pauses after reading until released
    struct GatedStore {
        inner: InMemoryStore,
        reached: Arc<Notify>,
        release: parking_lot::Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl IdentityMappingStore for GatedStore {
        async fn find(&self, provider: &str, subject: &str) -> StoreResult<Option<IdentityMapping>> {
            let found = self.inner.find(provider, subject).await;
            let release = self.release.lock().take();
            if let Some(release) = release {
                self.reached.notify_one();
                let _ = release.await;
            }
            found
        }

        async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<IdentityMapping>> {
            self.inner.find_by_user(user_id).await
        }

        async fn insert(&self, mapping: IdentityMapping) -> StoreResult<()> {
            self.inner.insert(mapping).await
        }

        async fn delete(&self, user_id: UserId, provider: &str) -> StoreResult<bool> {
            self.inner.delete(user_id, provider).await
        }

        async fn delete_unless_last(
            &self,
            user_id: UserId,
            provider: &str,
        ) -> StoreResult<UnlinkOutcome> {
            self.inner.delete_unless_last(user_id, provider).await
        }

        async fn count_by_user(&self, user_id: UserId) -> StoreResult<usize> {
            self.inner.count_by_user(user_id).await
        }
    }

    #[tokio::test]
    async fn test_unlink_during_resolve_is_not_recached() {
        let inner = InMemoryStore::new();
        let user = UserId::new_random();
        inner.add_mapping(IdentityMapping::new(user, "keycloak", "abc")).unwrap();
        inner.add_mapping(IdentityMapping::new(user, "google", "xyz")).unwrap();

        let (release_tx, release_rx) = oneshot::channel();
        let reached = Arc::new(Notify::new());
        let store = GatedStore {
            inner,
            reached: Arc::clone(&reached),
            release: parking_lot::Mutex::new(Some(release_rx)),
        };
        let resolver = IdentityResolver::new(Arc::new(store), Arc::new(InMemoryCache::new()));

        let pending = tokio::spawn({
            let resolver = resolver.clone();
            async move { resolver.resolve("keycloak", "abc").await }
        });

        reached.notified().await;
        resolver.unlink(user, "keycloak").await.unwrap();
        release_tx.send(()).unwrap();

        // The read predates the unlink, so it still sees the user
        assert_eq!(pending.await.unwrap().unwrap(), user);
        assert!(resolver.resolve("keycloak", "abc").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unlink_keeps_last_provider_with_one_subject() {
        let (resolver, store, _cache) = resolver();
        let user = UserId::new_random();
        store.add_mapping(IdentityMapping::new(user, "keycloak", "abc")).unwrap();

        let err = store
            .add_mapping(IdentityMapping::new(user, "keycloak", "def"))
            .unwrap_err();
        assert_eq!(err, StoreError::ProviderLinked("keycloak".to_string()));

        assert!(resolver.unlink(user, "keycloak").await.unwrap_err().is_conflict());
        assert_eq!(store.count_by_user(user).await.unwrap(), 1);
        assert_eq!(resolver.resolve("keycloak", "abc").await.unwrap(), user);
    }
}
