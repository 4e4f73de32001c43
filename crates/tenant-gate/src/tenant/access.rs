//! Tenant access policy

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;

use super::id::TenantId;
use crate::identity::UserId;
use crate::store::{MembershipStore, StoreResult};

/// Outcome of one (user, tenant) access check; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantAccessDecision {
    pub granted: bool,
    pub roles: BTreeSet<String>,
    pub unrestricted: bool,
    pub reason: String,
}

impl TenantAccessDecision {
    fn unrestricted(roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            granted: true,
            roles: roles.into_iter().collect(),
            unrestricted: true,
            reason: "unrestricted access grant".to_string(),
        }
    }

    fn member(roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            granted: true,
            roles: roles.into_iter().collect(),
            unrestricted: false,
            reason: "tenant member".to_string(),
        }
    }

    fn denied() -> Self {
        Self {
            granted: false,
            roles: BTreeSet::new(),
            unrestricted: false,
            reason: "not a member".to_string(),
        }
    }
}

/// Decides whether a user may act within a tenant
///
/// Checks run in order and the first match governs: unrestricted grant,
/// then tenant membership. Every call reads the store; decisions are never
/// cached, so membership changes apply to the very next request.
#[derive(Clone)]
pub struct TenantAccessValidator {
    store: Arc<dyn MembershipStore>,
}

impl std::fmt::Debug for TenantAccessValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantAccessValidator").finish_non_exhaustive()
    }
}

impl TenantAccessValidator {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    pub async fn validate(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
    ) -> StoreResult<TenantAccessDecision> {
        if let Some(grant) = self.store.find_unrestricted_grant(user_id).await? {
            return Ok(TenantAccessDecision::unrestricted(grant.roles));
        }

        if let Some(membership) = self.store.find_membership(user_id, tenant_id).await? {
            return Ok(TenantAccessDecision::member(membership.roles));
        }

        Ok(TenantAccessDecision::denied())
    }
}
