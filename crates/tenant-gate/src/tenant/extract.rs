//! Tenant identifier extraction from request headers

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::HOST;
use axum::http::{HeaderMap, HeaderName};
use thiserror::Error;

use super::id::TenantId;

/// Longest raw header value echoed back in a rejection
const MAX_ECHOED_LEN: usize = 64;

/// Why a request has no usable tenant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantRejection {
    #[error("No tenant identifier in request")]
    Missing,

    #[error("Invalid tenant identifier: '{raw}'")]
    Malformed { raw: String },

    #[error("Credential tenant '{claimed}' does not match requested tenant '{requested}'")]
    Mismatch { claimed: String, requested: TenantId },
}

impl TenantRejection {
    /// Short machine-readable kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Malformed { .. } => "malformed",
            Self::Mismatch { .. } => "mismatch",
        }
    }

    fn malformed(raw: &str) -> Self {
        let raw = match raw.char_indices().nth(MAX_ECHOED_LEN) {
            Some((cut, _)) => format!("{}...", &raw[..cut]),
            None => raw.to_string(),
        };
        Self::Malformed { raw }
    }
}

/// Resolves a subdomain slug to a tenant
#[async_trait]
pub trait SlugResolver: Send + Sync {
    async fn resolve_slug(&self, slug: &str) -> Option<TenantId>;
}

/// Slug map fixed at startup (case-insensitive)
#[derive(Debug, Clone, Default)]
pub struct StaticSlugResolver {
    slugs: HashMap<String, TenantId>,
}

impl StaticSlugResolver {
    #[must_use]
    pub fn new(slugs: HashMap<String, TenantId>) -> Self {
        Self {
            slugs: slugs
                .into_iter()
                .map(|(slug, id)| (slug.to_ascii_lowercase(), id))
                .collect(),
        }
    }
}

#[async_trait]
impl SlugResolver for StaticSlugResolver {
    async fn resolve_slug(&self, slug: &str) -> Option<TenantId> {
        self.slugs.get(&slug.to_ascii_lowercase()).copied()
    }
}

/// Extracts the target tenant: explicit header first, subdomain second
#[derive(Clone)]
pub struct TenantExtractor {
    header: HeaderName,
    base_domain: Option<String>,
    slugs: Option<Arc<dyn SlugResolver>>,
}

impl std::fmt::Debug for TenantExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantExtractor")
            .field("header", &self.header)
            .field("base_domain", &self.base_domain)
            .field("has_slug_resolver", &self.slugs.is_some())
            .finish()
    }
}

impl TenantExtractor {
    /// Header-only extraction
    #[must_use]
    pub const fn new(header: HeaderName) -> Self {
        Self {
            header,
            base_domain: None,
            slugs: None,
        }
    }

    /// Enable the subdomain fallback under `base_domain`
    #[must_use]
    pub fn with_subdomains(mut self, base_domain: &str, slugs: Arc<dyn SlugResolver>) -> Self {
        let base = base_domain.trim().trim_matches('.').to_ascii_lowercase();
        if !base.is_empty() {
            self.base_domain = Some(base);
            self.slugs = Some(slugs);
        }
        self
    }

    #[must_use]
    pub const fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// Extract the tenant for a request
    ///
    /// A blank or absent header falls through to the subdomain. A non-blank
    /// header that is not a tenant identifier is `Malformed`, never a
    /// fallthrough.
    pub async fn extract(&self, headers: &HeaderMap) -> Result<TenantId, TenantRejection> {
        if let Some(value) = headers.get(&self.header) {
            let raw = String::from_utf8_lossy(value.as_bytes());
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return TenantId::parse(trimmed).map_err(|_| TenantRejection::malformed(trimmed));
            }
        }

        if let Some(slug) = self.subdomain_slug(headers) {
            if let Some(resolver) = &self.slugs
                && let Some(tenant_id) = resolver.resolve_slug(&slug).await
            {
                tracing::debug!(slug = %slug, tenant_id = %tenant_id, "Tenant resolved from subdomain");
                return Ok(tenant_id);
            }
            tracing::debug!(slug = %slug, "Unknown tenant subdomain");
        }

        Err(TenantRejection::Missing)
    }

    /// The single label directly under the base domain, if any
    fn subdomain_slug(&self, headers: &HeaderMap) -> Option<String> {
        let base = self.base_domain.as_deref()?;
        let host = headers.get(HOST)?.to_str().ok()?.trim().to_ascii_lowercase();
        let host = strip_port(&host).trim_end_matches('.');

        let label = host.strip_suffix(base)?.strip_suffix('.')?;
        if label.is_empty() || label.contains('.') {
            return None;
        }
        Some(label.to_string())
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
