//! In-memory cache implementation with TTL support

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::config::DEFAULT_MAX_VALUE_SIZE;
use super::error::{CacheError, CacheResult};
use super::key::CacheKey;
use super::provider::{CacheProvider, CacheStats};

struct CacheEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

#[derive(Default)]
struct InMemoryStats {
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
}

/// Thread-safe in-memory cache with TTL support
///
/// Expiry is passive: an expired entry is treated as absent on read and stays
/// in memory until a write finds the cache full. There is no background
/// sweeper, so without `max_entries` expired entries are only replaced by
/// rewrites of the same key.
///
/// # Eviction
///
/// When `max_entries` is reached, expired entries are purged first. If the
/// store is still full, the entry closest to expiry is evicted (entries
/// without a TTL are evicted last). A capacity of zero stores nothing; see
/// [`InMemoryCache::disabled`].
#[derive(Clone)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry>>>,
    stats: Arc<RwLock<InMemoryStats>>,
    max_entries: Option<usize>,
    max_value_size: usize,
    default_ttl: Option<Duration>,
}

impl std::fmt::Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryCache")
            .field("max_entries", &self.max_entries)
            .field("max_value_size", &self.max_value_size)
            .field("default_ttl", &self.default_ttl)
            .field("entry_count", &self.store.read().len())
            .finish_non_exhaustive()
    }
}

impl InMemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(InMemoryStats::default())),
            max_entries: None,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            default_ttl: None,
        }
    }

    /// Cache that never retains a value, used when caching is turned off
    ///
    /// Reads still count as misses.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new().with_max_entries(0)
    }

    #[must_use]
    pub const fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    #[must_use]
    pub const fn with_max_value_size(mut self, max: usize) -> Self {
        self.max_value_size = max;
        self
    }

    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    fn make_room(store: &mut HashMap<String, CacheEntry>, max: usize, now: Instant) {
        store.retain(|_, entry| !entry.is_expired(now));
        if store.len() < max {
            return;
        }
        let victim = store
            .iter()
            .min_by_key(|(_, entry)| entry.expires_at.map_or((1, now), |exp| (0, exp)))
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            store.remove(&victim);
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheProvider for InMemoryCache {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Vec<u8>>> {
        let key_str = key.to_key_string();
        let now = Instant::now();

        let value = self
            .store
            .read()
            .get(&key_str)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone());

        let mut stats = self.stats.write();
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        Ok(value)
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        if value.len() > self.max_value_size {
            return Err(CacheError::ValueTooLarge {
                size: value.len(),
                max: self.max_value_size,
            });
        }

        if self.max_entries == Some(0) {
            return Ok(());
        }

        let key_str = key.to_key_string();
        let now = Instant::now();
        let entry = CacheEntry {
            value: value.to_vec(),
            expires_at: ttl.or(self.default_ttl).map(|d| now + d),
        };

        let mut store = self.store.write();
        if let Some(max) = self.max_entries
            && store.len() >= max
            && !store.contains_key(&key_str)
        {
            Self::make_room(&mut store, max, now);
        }
        store.insert(key_str, entry);
        drop(store);

        self.stats.write().sets += 1;

        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> CacheResult<bool> {
        let key_str = key.to_key_string();
        let removed = self.store.write().remove(&key_str).is_some();

        if removed {
            self.stats.write().deletes += 1;
        }

        Ok(removed)
    }

    async fn delete_by_prefix(&self, prefix: &str) -> CacheResult<u64> {
        let mut store = self.store.write();
        let before = store.len();
        store.retain(|k, _| !k.starts_with(prefix));
        let deleted = (before - store.len()) as u64;
        drop(store);

        if deleted > 0 {
            self.stats.write().deletes += deleted;
        }

        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entry_count = self
            .store
            .read()
            .values()
            .filter(|e| !e.is_expired(now))
            .count() as u64;
        let stats = self.stats.read();

        CacheStats {
            hits: stats.hits,
            misses: stats.misses,
            sets: stats.sets,
            deletes: stats.deletes,
            entry_count: Some(entry_count),
        }
    }
}
