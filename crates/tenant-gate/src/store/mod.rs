//! Persistence collaborators consumed by the pipeline
//!
//! The traits are the seam to a real database. [`InMemoryStore`] implements
//! both and is what the binary and the tests run against.

mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::{IdentityMapping, UserId};
use crate::tenant::TenantId;

pub use memory::InMemoryStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The (provider, subject) pair is already linked
    #[error("Duplicate identity mapping: {0}")]
    Duplicate(String),

    /// The user already holds a subject for this provider
    #[error("Provider already linked for user: {0}")]
    ProviderLinked(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of [`IdentityMappingStore::delete_unless_last`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlinkOutcome {
    Removed,
    /// The user has no mapping for the provider
    NotLinked,
    /// The provider is the only one the user has left; nothing was removed
    LastIdentity,
}

/// Membership of a user in one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub roles: Vec<String>,
}

/// Platform-operator grant bypassing per-tenant membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrestrictedGrant {
    pub user_id: UserId,
    pub roles: Vec<String>,
}

/// Identity mapping persistence
#[async_trait]
pub trait IdentityMappingStore: Send + Sync {
    /// Look up the mapping for an external (provider, subject) pair
    async fn find(&self, provider: &str, subject: &str) -> StoreResult<Option<IdentityMapping>>;

    /// All mappings of a user, in no particular order
    async fn find_by_user(&self, user_id: UserId) -> StoreResult<Vec<IdentityMapping>>;

    /// Insert a mapping
    ///
    /// Fails with [`StoreError::Duplicate`] when the pair exists and with
    /// [`StoreError::ProviderLinked`] when the user already has a subject for
    /// the provider.
    async fn insert(&self, mapping: IdentityMapping) -> StoreResult<()>;

    /// Delete the user's mapping for a provider; returns whether one was removed
    async fn delete(&self, user_id: UserId, provider: &str) -> StoreResult<bool>;

    /// Delete the user's mapping for a provider unless no other provider
    /// would remain. Check and delete are one atomic operation.
    async fn delete_unless_last(&self, user_id: UserId, provider: &str)
    -> StoreResult<UnlinkOutcome>;

    /// Number of distinct providers linked to the user
    async fn count_by_user(&self, user_id: UserId) -> StoreResult<usize>;
}

/// Tenant membership and unrestricted-grant lookups
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn find_membership(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> StoreResult<Option<Membership>>;

    async fn find_unrestricted_grant(&self, user_id: UserId)
    -> StoreResult<Option<UnrestrictedGrant>>;
}
