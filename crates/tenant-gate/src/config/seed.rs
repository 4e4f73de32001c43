//! Startup data for the in-memory collaborators

use serde::Deserialize;

use crate::identity::{IdentityMapping, UserId};
use crate::store::{InMemoryStore, StoreResult};
use crate::tenant::TenantId;

/// `[seed]` section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub identities: Vec<SeedIdentity>,
    pub memberships: Vec<SeedMembership>,
    pub unrestricted: Vec<SeedGrant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedIdentity {
    pub user_id: UserId,
    pub provider: String,
    pub subject: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedMembership {
    pub user_id: UserId,
    pub tenant_id: TenantId,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGrant {
    pub user_id: UserId,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl SeedConfig {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.identities.is_empty() && self.memberships.is_empty() && self.unrestricted.is_empty()
    }

    /// Load every record into `store`; a duplicate identity pair fails
    pub fn apply(&self, store: &InMemoryStore) -> StoreResult<()> {
        for identity in &self.identities {
            store.add_mapping(IdentityMapping::new(
                identity.user_id,
                identity.provider.as_str(),
                identity.subject.as_str(),
            ))?;
        }
        for membership in &self.memberships {
            store.add_membership(
                membership.user_id,
                membership.tenant_id,
                membership.roles.iter().cloned(),
            );
        }
        for grant in &self.unrestricted {
            store.add_unrestricted_grant(grant.user_id, grant.roles.iter().cloned());
        }

        tracing::info!(
            identities = self.identities.len(),
            memberships = self.memberships.len(),
            unrestricted = self.unrestricted.len(),
            "Seeded in-memory store"
        );
        Ok(())
    }
}
