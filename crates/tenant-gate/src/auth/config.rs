//! Credential verification and mapping configuration

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::constants::{DEFAULT_ROLES_CLAIM, DEFAULT_TENANT_CLAIM, ROLE_PREFIX};

/// Token signature and registered-claim validation settings
#[derive(Clone)]
pub struct JwtConfig {
    /// Expected `iss`; not validated when absent
    pub issuer: Option<Url>,
    /// Expected audience claims (must contain at least one match)
    pub audience: Vec<String>,
    /// JWKS URI for asymmetric algorithms
    pub jwks_uri: Option<Url>,
    /// Clock skew tolerance for exp/nbf validation
    pub clock_skew: Duration,
    /// HS256/384/512 shared secret
    pub hs_secret: Option<String>,
    /// JWKS cache TTL
    pub jwks_cache_ttl: Duration,
    /// JWKS refresh interval for background refresh
    pub jwks_refresh_interval: Duration,
}

// hs_secret is omitted entirely
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("jwks_uri", &self.jwks_uri)
            .field("clock_skew", &self.clock_skew)
            .field("has_hs_secret", &self.hs_secret.is_some())
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_refresh_interval", &self.jwks_refresh_interval)
            .finish()
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl JwtConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            issuer: None,
            audience: Vec::new(),
            jwks_uri: None,
            clock_skew: Duration::from_secs(60),
            hs_secret: None,
            jwks_cache_ttl: Duration::from_secs(3600),
            jwks_refresh_interval: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: Url) -> Self {
        self.issuer = Some(issuer);
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_jwks_uri(mut self, uri: Url) -> Self {
        self.jwks_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn with_hs_secret(mut self, secret: impl Into<String>) -> Self {
        self.hs_secret = Some(secret.into());
        self
    }

    /// Whether any signature key source is configured
    #[must_use]
    pub const fn has_key_source(&self) -> bool {
        self.hs_secret.is_some() || self.jwks_uri.is_some()
    }
}

/// How verified claims map onto a principal
#[derive(Debug, Clone)]
pub struct CredentialConfig {
    /// Dotted path of the roles claim
    pub roles_claim: String,
    /// Name of the tenant claim
    pub tenant_claim: String,
    /// Marker prepended to every role
    pub role_prefix: String,
    /// Issuer → provider name
    pub providers: HashMap<String, String>,
    /// Provider name for issuers missing from `providers`
    pub default_provider: Option<String>,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            roles_claim: DEFAULT_ROLES_CLAIM.to_string(),
            tenant_claim: DEFAULT_TENANT_CLAIM.to_string(),
            role_prefix: ROLE_PREFIX.to_string(),
            providers: HashMap::new(),
            default_provider: None,
        }
    }
}

impl CredentialConfig {
    /// Provider name for a token issuer
    ///
    /// Looked up in `providers` (trailing slash insensitive), then
    /// `default_provider`, then the issuer itself.
    #[must_use]
    pub fn provider_for(&self, issuer: Option<&str>) -> Option<String> {
        if let Some(iss) = issuer {
            let normalized = iss.trim_end_matches('/');
            let mapped = self
                .providers
                .iter()
                .find(|(k, _)| k.trim_end_matches('/') == normalized)
                .map(|(_, v)| v.clone());
            if mapped.is_some() {
                return mapped;
            }
        }
        self.default_provider
            .clone()
            .or_else(|| issuer.map(ToString::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_config_debug_redacts_secret() {
        let config = JwtConfig::new().with_hs_secret("super-secret-value");
        let debug_str = format!("{config:?}");
        assert!(!debug_str.contains("super-secret-value"));
        assert!(debug_str.contains("has_hs_secret: true"));
    }

    #[test]
    fn test_jwt_config_key_source() {
        assert!(!JwtConfig::new().has_key_source());
        assert!(JwtConfig::new().with_hs_secret("s").has_key_source());
        let uri = Url::parse("https://auth.example.com/jwks.json").unwrap();
        assert!(JwtConfig::new().with_jwks_uri(uri).has_key_source());
    }

    #[test]
    fn test_credential_config_defaults() {
        let config = CredentialConfig::default();
        assert_eq!(config.roles_claim, "realm_access.roles");
        assert_eq!(config.tenant_claim, "tenant_id");
        assert_eq!(config.role_prefix, "ROLE_");
    }

    #[test]
    fn test_provider_for() {
        let mut config = CredentialConfig::default();
        config.providers.insert(
            "https://sso.example.com/realms/fleet/".to_string(),
            "keycloak".to_string(),
        );

        assert_eq!(
            config.provider_for(Some("https://sso.example.com/realms/fleet")),
            Some("keycloak".to_string())
        );
        assert_eq!(
            config.provider_for(Some("https://accounts.google.com")),
            Some("https://accounts.google.com".to_string())
        );
        assert_eq!(config.provider_for(None), None);

        config.default_provider = Some("local".to_string());
        assert_eq!(
            config.provider_for(Some("https://accounts.google.com")),
            Some("local".to_string())
        );
        assert_eq!(config.provider_for(None), Some("local".to_string()));
    }
}
