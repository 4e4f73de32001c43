//! Environment variable loading for configuration

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use url::Url;

use super::builder::ConfigBuilder;
use crate::Result;

/// Environment variable names
mod vars {
    pub const HTTP_HOST: &str = "TENANT_GATE_HTTP_HOST";
    pub const HTTP_PORT: &str = "TENANT_GATE_HTTP_PORT";
    pub const JWT_ISSUER: &str = "TENANT_GATE_JWT_ISSUER";
    pub const JWT_AUDIENCE: &str = "TENANT_GATE_JWT_AUDIENCE";
    pub const JWT_HS_SECRET: &str = "TENANT_GATE_JWT_HS_SECRET";
    pub const JWKS_URI: &str = "TENANT_GATE_JWKS_URI";
    pub const TENANT_HEADER: &str = "TENANT_GATE_TENANT_HEADER";
    pub const BASE_DOMAIN: &str = "TENANT_GATE_BASE_DOMAIN";
    pub const CACHE_ENABLED: &str = "TENANT_GATE_CACHE_ENABLED";
    pub const IDENTITY_TTL_SECS: &str = "TENANT_GATE_IDENTITY_TTL_SECS";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const JSON_LOGS: &str = "TENANT_GATE_JSON_LOGS";
}

/// Load configuration from environment variables
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Ok(host_str) = env::var(vars::HTTP_HOST)
        && let Ok(host) = host_str.parse::<IpAddr>()
    {
        builder = builder.http_host(host);
    }

    if let Ok(port_str) = env::var(vars::HTTP_PORT)
        && let Ok(port) = port_str.parse::<u16>()
    {
        builder = builder.http_port(port);
    }

    // Credential verification
    if let Ok(issuer) = env::var(vars::JWT_ISSUER) {
        let url = Url::parse(&issuer)
            .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", vars::JWT_ISSUER, e)))?;
        builder = builder.jwt_issuer(url);
    }

    if let Ok(audience) = env::var(vars::JWT_AUDIENCE) {
        let audience = audience
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        builder = builder.jwt_audience(audience);
    }

    if let Ok(secret) = env::var(vars::JWT_HS_SECRET)
        && !secret.is_empty()
    {
        builder = builder.jwt_hs_secret(secret);
    }

    if let Ok(uri) = env::var(vars::JWKS_URI) {
        let url = Url::parse(&uri)
            .map_err(|e| crate::Error::Config(format!("Invalid {}: {}", vars::JWKS_URI, e)))?;
        builder = builder.jwks_uri(url);
    }

    // Tenant extraction
    if let Ok(header) = env::var(vars::TENANT_HEADER) {
        builder = builder.tenant_header(header);
    }

    if let Ok(domain) = env::var(vars::BASE_DOMAIN) {
        builder = builder.base_domain(Some(domain));
    }

    // Identity cache
    if let Ok(val) = env::var(vars::CACHE_ENABLED) {
        builder = builder.cache_enabled(parse_bool(&val));
    }

    if let Ok(ttl_str) = env::var(vars::IDENTITY_TTL_SECS)
        && let Ok(secs) = ttl_str.parse::<u64>()
    {
        builder = builder.identity_ttl(Duration::from_secs(secs));
    }

    // Telemetry
    if let Ok(level) = env::var(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
