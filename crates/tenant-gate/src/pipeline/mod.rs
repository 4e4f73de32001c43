//! Per-request authorization pipeline
//!
//! Stages run in a fixed order and each returns a typed result:
//!
//! 1. public allow-list check (skips everything below)
//! 2. tenant extraction: header first, subdomain second
//! 3. bearer credential; absent means anonymous, tenant only
//! 4. credential tenant claim must match the extracted tenant
//! 5. identity resolution, then tenant access validation
//!
//! The first rejection ends the pass. Rendering is left to the fault
//! boundary.

mod middleware;
mod public_routes;

use std::fmt;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use tracing::{debug, warn};

pub use middleware::tenant_authorization;
pub use public_routes::PublicRoutes;

use crate::auth::CredentialParser;
use crate::constants::BEARER_PREFIX;
use crate::context::ContextData;
use crate::fault::Fault;
use crate::identity::IdentityResolver;
use crate::tenant::{TenantAccessValidator, TenantExtractor, TenantId, TenantRejection};

/// Pipeline progress for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    TenantExtracted,
    CredentialResolved,
    AccessValidated,
    ContextPopulated,
    Dispatched,
    ContextCleared,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::TenantExtracted => "tenant_extracted",
            Self::CredentialResolved => "credential_resolved",
            Self::AccessValidated => "access_validated",
            Self::ContextPopulated => "context_populated",
            Self::Dispatched => "dispatched",
            Self::ContextCleared => "context_cleared",
        };
        f.write_str(name)
    }
}

/// Successful outcome of one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authorization {
    /// Allow-listed path; context stays empty
    Public,
    /// Tenant known, no credential presented
    Anonymous(ContextData),
    /// Credential verified and tenant access granted
    Authenticated(ContextData),
}

impl Authorization {
    /// Data to publish, if any
    #[must_use]
    pub fn into_context(self) -> Option<ContextData> {
        match self {
            Self::Public => None,
            Self::Anonymous(data) | Self::Authenticated(data) => Some(data),
        }
    }
}

/// Composes the authorization collaborators
#[derive(Debug, Clone)]
pub struct AuthorizationPipeline {
    public_routes: PublicRoutes,
    tenants: TenantExtractor,
    credentials: CredentialParser,
    identities: IdentityResolver,
    access: TenantAccessValidator,
}

impl AuthorizationPipeline {
    pub const fn new(
        public_routes: PublicRoutes,
        tenants: TenantExtractor,
        credentials: CredentialParser,
        identities: IdentityResolver,
        access: TenantAccessValidator,
    ) -> Self {
        Self {
            public_routes,
            tenants,
            credentials,
            identities,
            access,
        }
    }

    #[must_use]
    pub const fn identities(&self) -> &IdentityResolver {
        &self.identities
    }

    #[must_use]
    pub const fn public_routes(&self) -> &PublicRoutes {
        &self.public_routes
    }

    /// Run one authorization pass over a request's path and headers
    pub async fn authorize(&self, path: &str, headers: &HeaderMap) -> Result<Authorization, Fault> {
        if self.public_routes.is_public(path) {
            debug!(path, "Public route, skipping authorization");
            return Ok(Authorization::Public);
        }

        let tenant_id = self
            .tenants
            .extract(headers)
            .await
            .map_err(|e| reject(Stage::Start, path, e.into()))?;
        debug!(path, stage = %Stage::TenantExtracted, %tenant_id);

        let Some(token) = bearer_token(headers).map_err(|e| reject(Stage::TenantExtracted, path, e))?
        else {
            debug!(path, %tenant_id, "No credential, continuing as anonymous");
            return Ok(Authorization::Anonymous(ContextData::anonymous(tenant_id)));
        };

        let principal = self
            .credentials
            .parse(token)
            .await
            .map_err(|e| reject(Stage::TenantExtracted, path, e.into()))?;

        if let Some(claimed) = principal.tenant_claim.as_deref() {
            check_tenant_claim(claimed, tenant_id)
                .map_err(|e| reject(Stage::TenantExtracted, path, e))?;
        }

        let user_id = self
            .identities
            .resolve(&principal.provider, &principal.subject)
            .await
            .map_err(|e| reject(Stage::TenantExtracted, path, e.into()))?;
        debug!(path, stage = %Stage::CredentialResolved, %user_id, provider = %principal.provider);

        let decision = self
            .access
            .validate(user_id, tenant_id)
            .await
            .map_err(|e| reject(Stage::CredentialResolved, path, e.into()))?;
        if !decision.granted {
            return Err(reject(
                Stage::CredentialResolved,
                path,
                Fault::AccessDenied(decision.reason),
            ));
        }
        debug!(
            path,
            stage = %Stage::AccessValidated,
            %user_id,
            %tenant_id,
            unrestricted = decision.unrestricted,
        );

        Ok(Authorization::Authenticated(ContextData {
            tenant_id: Some(tenant_id),
            roles: decision.roles,
            user_id: Some(user_id),
            unrestricted: decision.unrestricted,
        }))
    }
}

fn reject(stage: Stage, path: &str, fault: Fault) -> Fault {
    match &fault {
        Fault::Unexpected(detail) => {
            warn!(path, %stage, kind = fault.kind(), detail = %detail, "Authorization failed");
        }
        _ => warn!(path, %stage, kind = fault.kind(), "Request rejected"),
    }
    fault
}

/// A tenant claim that is not a tenant identifier can never match
fn check_tenant_claim(claimed: &str, requested: TenantId) -> Result<(), Fault> {
    match TenantId::parse(claimed) {
        Ok(id) if id == requested => Ok(()),
        _ => Err(Fault::InvalidTenant(TenantRejection::Mismatch {
            claimed: claimed.to_string(),
            requested,
        })),
    }
}

/// Bearer token from the `Authorization` header
///
/// `Ok(None)` when the header is absent. A header that is present but not a
/// usable bearer credential is `Unauthenticated`.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, Fault> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| Fault::Unauthenticated("invalid Authorization header".to_string()))?;

    let token = value
        .get(..BEARER_PREFIX.len())
        .filter(|scheme| scheme.eq_ignore_ascii_case(BEARER_PREFIX))
        .map(|_| value[BEARER_PREFIX.len()..].trim())
        .ok_or_else(|| Fault::Unauthenticated("expected Bearer credentials".to_string()))?;

    if token.is_empty() {
        return Err(Fault::Unauthenticated("empty bearer token".to_string()));
    }
    Ok(Some(token))
}
