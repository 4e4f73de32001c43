//! TOML configuration file loading

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::builder::ConfigBuilder;
use super::seed::SeedConfig;
use crate::Result;
use crate::cache::CacheBackend;
use crate::tenant::TenantId;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./tenant-gate.toml",
    "~/.config/tenant-gate/config.toml",
    "/etc/tenant-gate/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn parse_url(field: &str, raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| crate::Error::Config(format!("Invalid {field}: {e}")))
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(server) = config.server {
        if let Some(host_str) = server.host
            && let Ok(host) = host_str.parse::<IpAddr>()
        {
            builder = builder.http_host(host);
        }

        if let Some(port) = server.port {
            builder = builder.http_port(port);
        }

        if let Some(secs) = server.request_timeout_secs {
            builder = builder.request_timeout(Duration::from_secs(secs));
        }
    }

    if let Some(tenant) = config.tenant {
        if let Some(header) = tenant.header {
            builder = builder.tenant_header(header);
        }

        if let Some(domain) = tenant.base_domain {
            builder = builder.base_domain(Some(domain));
        }

        if let Some(slugs) = tenant.slugs {
            let parsed = slugs
                .into_iter()
                .map(|(slug, id)| {
                    TenantId::parse(&id)
                        .map(|id| (slug.clone(), id))
                        .map_err(|e| {
                            crate::Error::Config(format!("Invalid tenant id for slug '{slug}': {e}"))
                        })
                })
                .collect::<Result<HashMap<_, _>>>()?;
            builder = builder.tenant_slugs(parsed);
        }
    }

    if let Some(creds) = config.credentials {
        if let Some(issuer) = creds.issuer {
            builder = builder.jwt_issuer(parse_url("credentials.issuer", &issuer)?);
        }

        if let Some(audience) = creds.audience {
            builder = builder.jwt_audience(audience);
        }

        if let Some(secret) = creds.hs_secret {
            builder = builder.jwt_hs_secret(secret);
        }

        if let Some(uri) = creds.jwks_uri {
            builder = builder.jwks_uri(parse_url("credentials.jwks_uri", &uri)?);
        }

        if let Some(secs) = creds.clock_skew_secs {
            builder = builder.clock_skew(Duration::from_secs(secs));
        }

        if let Some(path) = creds.roles_claim {
            builder = builder.roles_claim(path);
        }

        if let Some(name) = creds.tenant_claim {
            builder = builder.tenant_claim(name);
        }

        if let Some(prefix) = creds.role_prefix {
            builder = builder.role_prefix(prefix);
        }

        for (issuer, name) in creds.providers.unwrap_or_default() {
            builder = builder.provider(issuer, name);
        }

        if let Some(name) = creds.default_provider {
            builder = builder.default_provider(Some(name));
        }
    }

    if let Some(cache) = config.cache {
        if let Some(enabled) = cache.enabled {
            builder = builder.cache_enabled(enabled);
        }

        if let Some(backend) = cache.backend {
            let backend: CacheBackend = backend.parse().unwrap_or_default();
            builder = builder.cache_backend(backend);
        }

        if let Some(secs) = cache.identity_ttl_secs {
            builder = builder.identity_ttl(Duration::from_secs(secs));
        }

        if let Some(max) = cache.max_entries {
            builder = builder.cache_max_entries(Some(max));
        }
    }

    if let Some(routes) = config.routes {
        if let Some(prefixes) = routes.public_prefixes {
            builder = builder.public_prefixes(prefixes);
        }

        if let Some(exact) = routes.public_exact {
            builder = builder.public_exact(exact);
        }
    }

    if let Some(obs) = config.observability {
        if let Some(name) = obs.service_name {
            builder = builder.service_name(name);
        }

        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    if let Some(seed) = config.seed {
        builder = builder.seed(seed);
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    server: Option<ServerFileConfig>,
    tenant: Option<TenantFileConfig>,
    credentials: Option<CredentialsFileConfig>,
    cache: Option<CacheFileConfig>,
    routes: Option<RoutesFileConfig>,
    observability: Option<ObservabilityConfig>,
    seed: Option<SeedConfig>,
}

#[derive(Debug, Deserialize)]
struct ServerFileConfig {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TenantFileConfig {
    header: Option<String>,
    base_domain: Option<String>,
    slugs: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct CredentialsFileConfig {
    issuer: Option<String>,
    audience: Option<Vec<String>>,
    hs_secret: Option<String>,
    jwks_uri: Option<String>,
    clock_skew_secs: Option<u64>,
    roles_claim: Option<String>,
    tenant_claim: Option<String>,
    role_prefix: Option<String>,
    providers: Option<HashMap<String, String>>,
    default_provider: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CacheFileConfig {
    enabled: Option<bool>,
    backend: Option<String>,
    identity_ttl_secs: Option<u64>,
    max_entries: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RoutesFileConfig {
    public_prefixes: Option<Vec<String>>,
    public_exact: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    service_name: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
}
