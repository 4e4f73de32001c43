//! Configuration builder

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use axum::http::HeaderName;
use url::Url;

use super::seed::SeedConfig;
use crate::Error;
use crate::auth::{CredentialConfig, JwtConfig};
use crate::cache::{CacheBackend, CacheConfig};
use crate::constants::{
    DEFAULT_PUBLIC_EXACT, DEFAULT_PUBLIC_PREFIXES, DEFAULT_SERVICE_NAME, DEFAULT_TENANT_HEADER,
};
use crate::pipeline::PublicRoutes;
use crate::tenant::TenantId;

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub tenant: TenantConfig,
    pub jwt: JwtConfig,
    pub credentials: CredentialConfig,
    pub cache: CacheConfig,
    pub routes: PublicRoutes,
    pub telemetry: TelemetryConfig,
    pub seed: SeedConfig,
}

impl Config {
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_host: IpAddr,
    pub http_port: u16,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            http_port: 8080,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Tenant extraction configuration
#[derive(Debug, Clone)]
pub struct TenantConfig {
    pub header: HeaderName,
    /// Enables the subdomain fallback when set
    pub base_domain: Option<String>,
    pub slugs: HashMap<String, TenantId>,
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    server: ServerConfig,
    tenant_header: String,
    base_domain: Option<String>,
    slugs: HashMap<String, TenantId>,
    jwt: JwtConfig,
    credentials: CredentialConfig,
    cache: CacheConfig,
    public_prefixes: Option<Vec<String>>,
    public_exact: Option<Vec<String>>,
    telemetry: TelemetryConfig,
    seed: SeedConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            server: ServerConfig::default(),
            tenant_header: DEFAULT_TENANT_HEADER.to_string(),
            base_domain: None,
            slugs: HashMap::new(),
            jwt: JwtConfig::new(),
            credentials: CredentialConfig::default(),
            cache: CacheConfig::new(),
            public_prefixes: None,
            public_exact: None,
            telemetry: TelemetryConfig::default(),
            seed: SeedConfig::default(),
        }
    }

    #[must_use]
    pub const fn http_host(mut self, host: IpAddr) -> Self {
        self.server.http_host = host;
        self
    }

    #[must_use]
    pub const fn http_port(mut self, port: u16) -> Self {
        self.server.http_port = port;
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.server.request_timeout = timeout;
        self
    }

    // Tenant extraction

    #[must_use]
    pub fn tenant_header(mut self, name: String) -> Self {
        self.tenant_header = name;
        self
    }

    #[must_use]
    pub fn base_domain(mut self, domain: Option<String>) -> Self {
        self.base_domain = domain.filter(|d| !d.trim().is_empty());
        self
    }

    #[must_use]
    pub fn tenant_slugs(mut self, slugs: HashMap<String, TenantId>) -> Self {
        self.slugs = slugs;
        self
    }

    // Credential verification

    #[must_use]
    pub fn jwt_issuer(mut self, issuer: Url) -> Self {
        self.jwt.issuer = Some(issuer);
        self
    }

    #[must_use]
    pub fn jwt_audience(mut self, audience: Vec<String>) -> Self {
        self.jwt.audience = audience;
        self
    }

    #[must_use]
    pub fn jwt_hs_secret(mut self, secret: String) -> Self {
        self.jwt.hs_secret = Some(secret);
        self
    }

    #[must_use]
    pub fn jwks_uri(mut self, uri: Url) -> Self {
        self.jwt.jwks_uri = Some(uri);
        self
    }

    #[must_use]
    pub const fn clock_skew(mut self, skew: Duration) -> Self {
        self.jwt.clock_skew = skew;
        self
    }

    // Claim mapping

    #[must_use]
    pub fn roles_claim(mut self, path: String) -> Self {
        self.credentials.roles_claim = path;
        self
    }

    #[must_use]
    pub fn tenant_claim(mut self, name: String) -> Self {
        self.credentials.tenant_claim = name;
        self
    }

    #[must_use]
    pub fn role_prefix(mut self, prefix: String) -> Self {
        self.credentials.role_prefix = prefix;
        self
    }

    /// Map a token issuer to a provider name
    #[must_use]
    pub fn provider(mut self, issuer: String, name: String) -> Self {
        self.credentials.providers.insert(issuer, name);
        self
    }

    #[must_use]
    pub fn default_provider(mut self, name: Option<String>) -> Self {
        self.credentials.default_provider = name;
        self
    }

    // Identity cache

    #[must_use]
    pub const fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache.enabled = enabled;
        self
    }

    #[must_use]
    pub const fn cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache.backend = backend;
        self
    }

    #[must_use]
    pub const fn identity_ttl(mut self, ttl: Duration) -> Self {
        self.cache.identity_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn cache_max_entries(mut self, max: Option<usize>) -> Self {
        self.cache.max_entries = max;
        self
    }

    // Public routes

    #[must_use]
    pub fn public_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.public_prefixes = Some(prefixes);
        self
    }

    #[must_use]
    pub fn public_exact(mut self, paths: Vec<String>) -> Self {
        self.public_exact = Some(paths);
        self
    }

    // Telemetry

    #[must_use]
    pub fn service_name(mut self, name: String) -> Self {
        self.telemetry.service_name = name;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    #[must_use]
    pub fn seed(mut self, seed: SeedConfig) -> Self {
        self.seed = seed;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        if !self.jwt.has_key_source() {
            return Err(Error::Config(
                "a token verification key is required: set credentials.hs_secret or credentials.jwks_uri"
                    .into(),
            ));
        }

        let header = HeaderName::from_bytes(self.tenant_header.trim().as_bytes()).map_err(|e| {
            Error::Config(format!(
                "Invalid tenant header name '{}': {e}",
                self.tenant_header
            ))
        })?;

        let routes = PublicRoutes::new(
            self.public_prefixes.unwrap_or_else(default_prefixes),
            self.public_exact.unwrap_or_else(default_exact),
        );

        let service_name = if self.telemetry.service_name.is_empty() {
            DEFAULT_SERVICE_NAME.to_string()
        } else {
            self.telemetry.service_name
        };

        let log_level = if self.telemetry.log_level.is_empty() {
            "info".to_string()
        } else {
            self.telemetry.log_level
        };

        Ok(Config {
            server: self.server,
            tenant: TenantConfig {
                header,
                base_domain: self.base_domain,
                slugs: self.slugs,
            },
            jwt: self.jwt,
            credentials: self.credentials,
            cache: self.cache,
            routes,
            telemetry: TelemetryConfig {
                service_name,
                log_level,
                json_logs: self.telemetry.json_logs,
            },
            seed: self.seed,
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_prefixes() -> Vec<String> {
    DEFAULT_PUBLIC_PREFIXES
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn default_exact() -> Vec<String> {
    DEFAULT_PUBLIC_EXACT
        .iter()
        .map(ToString::to_string)
        .collect()
}
