//! In-memory collaborators

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    IdentityMappingStore, Membership, MembershipStore, StoreError, StoreResult, UnlinkOutcome,
    UnrestrictedGrant,
};
use crate::identity::{IdentityMapping, UserId};
use crate::tenant::TenantId;

#[derive(Default)]
struct Tables {
    /// Keyed by (provider, subject)
    mappings: HashMap<(String, String), IdentityMapping>,
    memberships: HashMap<(UserId, TenantId), Membership>,
    grants: HashMap<UserId, UnrestrictedGrant>,
}

impl Tables {
    fn providers_of(&self, user_id: UserId) -> BTreeSet<&str> {
        self.mappings
            .values()
            .filter(|m| m.user_id == user_id)
            .map(|m| m.provider.as_str())
            .collect()
    }

    fn remove(&mut self, user_id: UserId, provider: &str) -> bool {
        let before = self.mappings.len();
        self.mappings
            .retain(|(p, _), m| !(m.user_id == user_id && p == provider));
        self.mappings.len() < before
    }
}

/// Lookup counters, used to assert which collaborators a request touched
#[derive(Debug, Default)]
struct Counters {
    mapping_lookups: AtomicU64,
    membership_lookups: AtomicU64,
}

/// Thread-safe in-memory implementation of both store traits
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("InMemoryStore")
            .field("mappings", &tables.mappings.len())
            .field("memberships", &tables.memberships.len())
            .field("grants", &tables.grants.len())
            .finish()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `roles` within `tenant_id`, replacing any existing membership
    pub fn add_membership<I, S>(&self, user_id: UserId, tenant_id: TenantId, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let membership = Membership {
            user_id,
            tenant_id,
            roles: roles.into_iter().map(Into::into).collect(),
        };
        self.tables
            .write()
            .memberships
            .insert((user_id, tenant_id), membership);
    }

    pub fn remove_membership(&self, user_id: UserId, tenant_id: TenantId) -> bool {
        self.tables
            .write()
            .memberships
            .remove(&(user_id, tenant_id))
            .is_some()
    }

    /// Grant platform-wide unrestricted access
    pub fn add_unrestricted_grant<I, S>(&self, user_id: UserId, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let grant = UnrestrictedGrant {
            user_id,
            roles: roles.into_iter().map(Into::into).collect(),
        };
        self.tables.write().grants.insert(user_id, grant);
    }

    /// Insert a mapping
    ///
    /// `Duplicate` when the (provider, subject) pair exists, `ProviderLinked`
    /// when the user already has a subject for the provider.
    pub fn add_mapping(&self, mapping: IdentityMapping) -> StoreResult<()> {
        let key = (mapping.provider.clone(), mapping.subject.clone());
        let mut tables = self.tables.write();
        if tables.mappings.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("{}:{}", key.0, key.1)));
        }
        if tables.providers_of(mapping.user_id).contains(key.0.as_str()) {
            return Err(StoreError::ProviderLinked(key.0));
        }
        tables.mappings.insert(key, mapping);
        Ok(())
    }

    /// Number of `find` calls served so far
    #[must_use]
    pub fn mapping_lookups(&self) -> u64 {
        self.counters.mapping_lookups.load(Ordering::Relaxed)
    }

    /// Number of membership and grant lookups served so far
    #[must_use]
    pub fn membership_lookups(&self) -> u64 {
        self.counters.membership_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl IdentityMappingStore for InMemoryStore {
    async fn find(&self, provider: &str, subject: &str) -> StoreResult<Option<IdentityMapping>> {
        self.counters.mapping_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tables
            .read()
            .mappings
            .get(&(provider.to_string(), subject.to_string()))
            .cloned())
    }

    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<IdentityMapping>> {
        Ok(self
            .tables
            .read()
            .mappings
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert(&self, mapping: IdentityMapping) -> StoreResult<()> {
        self.add_mapping(mapping)
    }

    async fn delete(&self, user_id: UserId, provider: &str) -> StoreResult<bool> {
        Ok(self.tables.write().remove(user_id, provider))
    }

    async fn delete_unless_last(
        &self,
        user_id: UserId,
        provider: &str,
    ) -> StoreResult<UnlinkOutcome> {
        let mut tables = self.tables.write();
        let (linked, count) = {
            let providers = tables.providers_of(user_id);
            (providers.contains(provider), providers.len())
        };
        if !linked {
            return Ok(UnlinkOutcome::NotLinked);
        }
        if count <= 1 {
            return Ok(UnlinkOutcome::LastIdentity);
        }
        tables.remove(user_id, provider);
        Ok(UnlinkOutcome::Removed)
    }

    async fn count_by_user(&self, user_id: UserId) -> StoreResult<usize> {
        Ok(self.tables.read().providers_of(user_id).len())
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn find_membership(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> StoreResult<Option<Membership>> {
        self.counters.membership_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .tables
            .read()
            .memberships
            .get(&(user_id, tenant_id))
            .cloned())
    }

    async fn find_unrestricted_grant(
        &self,
        user_id: UserId,
    ) -> StoreResult<Option<UnrestrictedGrant>> {
        self.counters.membership_lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.tables.read().grants.get(&user_id).cloned())
    }
}
