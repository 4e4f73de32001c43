//! Request-scoped authorization context
//!
//! One [`RequestContext`] exists per request. It is created empty when the
//! request enters the fault boundary, populated at most once by the
//! authorization pipeline, read by handlers through the axum extractor, and
//! cleared when the request leaves. Nothing here is global or thread-local:
//! the context travels in the request extensions.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use crate::fault::Fault;
use crate::identity::UserId;
use crate::tenant::{TenantId, TenantRejection};

/// Values published to downstream handlers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContextData {
    pub tenant_id: Option<TenantId>,
    pub roles: BTreeSet<String>,
    pub user_id: Option<UserId>,
    pub unrestricted: bool,
}

impl ContextData {
    /// Tenant only; used for anonymous requests
    #[must_use]
    pub fn anonymous(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("Request context already populated")]
    AlreadyPopulated,

    #[error("Request context already cleared")]
    Cleared,
}

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Populated(ContextData),
    Cleared,
}

/// Shared handle to one request's context
///
/// Clones refer to the same slot. The slot moves `Empty -> Populated ->
/// Cleared`, or straight to `Cleared`; it never goes back.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    slot: Arc<RwLock<Slot>>,
}

impl RequestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the authorization result; allowed once
    pub fn populate(&self, data: ContextData) -> Result<(), ContextError> {
        let mut slot = self.slot.write();
        match *slot {
            Slot::Empty => {
                *slot = Slot::Populated(data);
                Ok(())
            }
            Slot::Populated(_) => Err(ContextError::AlreadyPopulated),
            Slot::Cleared => Err(ContextError::Cleared),
        }
    }

    /// Current values; empty data when not populated
    #[must_use]
    pub fn snapshot(&self) -> ContextData {
        match &*self.slot.read() {
            Slot::Populated(data) => data.clone(),
            Slot::Empty | Slot::Cleared => ContextData::default(),
        }
    }

    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        match &*self.slot.read() {
            Slot::Populated(data) => data.tenant_id,
            Slot::Empty | Slot::Cleared => None,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match &*self.slot.read() {
            Slot::Populated(data) => data.user_id,
            Slot::Empty | Slot::Cleared => None,
        }
    }

    #[must_use]
    pub fn roles(&self) -> BTreeSet<String> {
        self.snapshot().roles
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        match &*self.slot.read() {
            Slot::Populated(data) => data.roles.contains(role),
            Slot::Empty | Slot::Cleared => false,
        }
    }

    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(&*self.slot.read(), Slot::Populated(data) if data.unrestricted)
    }

    /// True when no tenant, user, or role is visible
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &*self.slot.read() {
            Slot::Populated(data) => {
                data.tenant_id.is_none() && data.user_id.is_none() && data.roles.is_empty()
            }
            Slot::Empty | Slot::Cleared => true,
        }
    }

    #[must_use]
    pub fn is_cleared(&self) -> bool {
        matches!(*self.slot.read(), Slot::Cleared)
    }

    /// Drop all values; idempotent
    pub fn clear(&self) {
        *self.slot.write() = Slot::Cleared;
    }

    /// Guard that clears the context when dropped
    #[must_use = "the context is cleared as soon as the guard is dropped"]
    pub fn guard(&self) -> ContextGuard {
        ContextGuard {
            context: self.clone(),
        }
    }

    /// Tenant of the request, or `InvalidTenant(missing)`
    pub fn require_tenant(&self) -> Result<TenantId, Fault> {
        self.tenant_id()
            .ok_or(Fault::InvalidTenant(TenantRejection::Missing))
    }

    /// Fail with `AccessDenied` unless the context carries `role`
    pub fn require_role(&self, role: &str) -> Result<(), Fault> {
        if self.has_role(role) {
            Ok(())
        } else {
            Err(Fault::AccessDenied(format!("requires {role}")))
        }
    }

    /// Allow the user themself, or any unrestricted caller
    pub fn require_user_or_unrestricted(&self, user_id: UserId) -> Result<(), Fault> {
        let Some(current) = self.user_id() else {
            return Err(Fault::Unauthenticated("no authenticated user".to_string()));
        };
        if current == user_id || self.is_unrestricted() {
            Ok(())
        } else {
            Err(Fault::AccessDenied(
                "cannot manage another user's identities".to_string(),
            ))
        }
    }
}

/// Clears its context on drop, including unwinds and cancellations
#[derive(Debug)]
pub struct ContextGuard {
    context: RequestContext,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.context.clear();
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Fault;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| Fault::Unexpected("request context not installed".to_string()))
    }
}
