use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
#[cfg(feature = "jwks")]
use tenant_gate::auth::{JwksCache, JwksRefreshTask};
use tenant_gate::config::{self, Config};
use tenant_gate::observability::init_observability;
use tenant_gate::{InMemoryStore, JwtValidator, build_pipeline, serve};
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "tenant-gate")]
#[command(about = "Tenant and identity authorization gateway", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP bind host
    #[arg(long)]
    http_host: Option<IpAddr>,

    /// HTTP bind port
    #[arg(long)]
    http_port: Option<u16>,

    /// Expected token issuer
    #[arg(long)]
    issuer: Option<String>,

    /// Tenant header name
    #[arg(long)]
    tenant_header: Option<String>,

    /// Base domain for subdomain tenant resolution
    #[arg(long)]
    base_domain: Option<String>,

    /// Disable the identity cache
    #[arg(long)]
    no_cache: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path)?
    } else {
        config::load_config()?
    };

    // CLI flags override file and environment
    if let Some(host) = args.http_host {
        builder = builder.http_host(host);
    }

    if let Some(port) = args.http_port {
        builder = builder.http_port(port);
    }

    if let Some(ref issuer) = args.issuer {
        let url = Url::parse(issuer).map_err(|e| anyhow::anyhow!("Invalid issuer URL: {e}"))?;
        builder = builder.jwt_issuer(url);
    }

    if let Some(header) = args.tenant_header {
        builder = builder.tenant_header(header);
    }

    if args.base_domain.is_some() {
        builder = builder.base_domain(args.base_domain);
    }

    if args.no_cache {
        builder = builder.cache_enabled(false);
    }

    if args.verbose {
        builder = builder.log_level("debug".to_string());
    }

    if args.json_logs {
        builder = builder.json_logs(true);
    }

    let config = builder.build()?;

    init_observability(&config.telemetry)?;

    let store = InMemoryStore::new();
    if !config.seed.is_empty() {
        config.seed.apply(&store)?;
    }

    #[cfg(feature = "jwks")]
    let refresh_shutdown = tokio_util::sync::CancellationToken::new();

    #[cfg(feature = "jwks")]
    let validator = {
        let mut validator = JwtValidator::new(config.jwt.clone());
        if let Some(uri) = config.jwt.jwks_uri.clone() {
            let cache = Arc::new(JwksCache::new(uri, config.jwt.jwks_cache_ttl)?);
            if let Err(e) = cache.refresh().await {
                tracing::warn!(error = %e, "Initial JWKS fetch failed; retrying in background");
            }
            JwksRefreshTask::new(Arc::clone(&cache), config.jwt.jwks_refresh_interval)
                .spawn(refresh_shutdown.clone());
            validator = validator.with_jwks(cache);
        }
        validator
    };

    #[cfg(not(feature = "jwks"))]
    let validator = {
        if config.jwt.jwks_uri.is_some() {
            tracing::warn!("jwks_uri is set but the jwks feature is disabled; only HS* tokens verify");
        }
        JwtValidator::new(config.jwt.clone())
    };

    let pipeline = Arc::new(build_pipeline(&config, Arc::new(validator), &store));
    log_startup(&config);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    };

    serve(&config, pipeline, shutdown).await?;

    #[cfg(feature = "jwks")]
    refresh_shutdown.cancel();

    Ok(())
}

fn log_startup(config: &Config) {
    tracing::info!("Starting tenant gate");
    tracing::info!(
        "Subdomain tenants: {}",
        config.tenant.base_domain.as_deref().unwrap_or("disabled")
    );
    tracing::info!(
        "Identity cache enabled: {}, backend: {:?}, ttl: {:?}",
        config.cache.enabled,
        config.cache.backend,
        config.cache.identity_ttl
    );
    tracing::info!("Request timeout: {:?}", config.server.request_timeout);
}
