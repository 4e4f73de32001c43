//! HTTP surface
//!
//! Middleware order, outermost first: request tracing, timeout, fault
//! boundary, panic catcher, tenant authorization, handlers.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{delete, get};
use axum::{Router, middleware};
use serde::{Deserialize, Serialize};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{CredentialParser, JwtConfig, TokenVerifier};
use crate::cache::create_cache;
use crate::config::Config;
use crate::context::{ContextData, RequestContext};
use crate::fault::{Fault, fault_boundary, panic_to_fault};
use crate::identity::{CacheStatus, IdentityResolver, UserId};
use crate::pipeline::{AuthorizationPipeline, tenant_authorization};
use crate::store::InMemoryStore;
use crate::tenant::{StaticSlugResolver, TenantAccessValidator, TenantExtractor};
use crate::{Error, Result};

/// Shorter HMAC secrets are accepted but flagged at startup
const MIN_HS_SECRET_LEN: usize = 32;

/// Handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub identities: IdentityResolver,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    identity_cache: CacheStatus,
}

#[derive(Debug, Serialize)]
struct PingResponse {
    pong: bool,
}

#[derive(Debug, Serialize)]
struct IdentityList {
    user_id: UserId,
    providers: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct LinkRequest {
    provider: String,
    subject: String,
}

/// Wire the collaborators of one pipeline from configuration
pub fn build_pipeline(
    config: &Config,
    verifier: Arc<dyn TokenVerifier>,
    store: &InMemoryStore,
) -> AuthorizationPipeline {
    let mut tenants = TenantExtractor::new(config.tenant.header.clone());
    if let Some(domain) = &config.tenant.base_domain {
        let slugs = StaticSlugResolver::new(config.tenant.slugs.clone());
        tenants = tenants.with_subdomains(domain, Arc::new(slugs));
    }

    let cache = create_cache(&config.cache, &config.telemetry.service_name);
    let identities = IdentityResolver::new(Arc::new(store.clone()), cache)
        .with_ttl(config.cache.identity_ttl);

    AuthorizationPipeline::new(
        config.routes.clone(),
        tenants,
        CredentialParser::new(verifier, config.credentials.clone()),
        identities,
        TenantAccessValidator::new(Arc::new(store.clone())),
    )
}

/// Application routes without middleware
fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/public/ping", get(ping_handler))
        .route("/api/v1/context", get(context_handler))
        .route(
            "/api/v1/users/{user_id}/identities",
            get(list_identities_handler).post(link_identity_handler),
        )
        .route(
            "/api/v1/users/{user_id}/identities/{provider}",
            delete(unlink_identity_handler),
        )
}

fn apply_layers(
    router: Router,
    pipeline: Arc<AuthorizationPipeline>,
    request_timeout: Duration,
) -> Router {
    router
        .layer(middleware::from_fn_with_state(pipeline, tenant_authorization))
        .layer(CatchPanicLayer::custom(panic_to_fault))
        .layer(middleware::from_fn(fault_boundary))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Assemble the full application router
pub fn build_router(pipeline: Arc<AuthorizationPipeline>, request_timeout: Duration) -> Router {
    let state = AppState {
        identities: pipeline.identities().clone(),
    };
    apply_layers(api_routes().with_state(state), pipeline, request_timeout)
}

/// Serve until `shutdown` resolves
pub async fn serve(
    config: &Config,
    pipeline: Arc<AuthorizationPipeline>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = SocketAddr::new(config.server.http_host, config.server.http_port);
    emit_security_warnings(config.server.http_host, &config.jwt, &config.tenant.header);

    let app = build_router(pipeline, config.server.request_timeout);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Transport(format!("Failed to bind to {addr}: {e}")))?;

    tracing::info!("HTTP server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Transport(format!("HTTP server error: {e}")))?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

fn emit_security_warnings(host: IpAddr, jwt: &JwtConfig, tenant_header: &HeaderName) {
    if host.is_unspecified() {
        tracing::warn!(
            "HTTP server binding to all interfaces ({host}). \
             This exposes the server to all network interfaces."
        );
    } else if !host.is_loopback() {
        tracing::warn!(
            "HTTP server binding to non-loopback address ({host}). \
             Ensure network security policies are in place."
        );
    }

    if jwt
        .hs_secret
        .as_ref()
        .is_some_and(|s| s.len() < MIN_HS_SECRET_LEN)
    {
        tracing::warn!(
            "SECURITY WARNING: HMAC token secret is shorter than {MIN_HS_SECRET_LEN} bytes."
        );
    }

    if jwt.issuer.is_none() {
        tracing::warn!("Token issuer not configured; any issuer signed with a trusted key is accepted");
    }

    tracing::info!(header = %tenant_header, "Tenant header configured");
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let identity_cache = state.identities.cache_status().await;
    Json(HealthResponse {
        status: if identity_cache.healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        identity_cache,
    })
}

async fn ping_handler() -> impl IntoResponse {
    Json(PingResponse { pong: true })
}

async fn context_handler(context: RequestContext) -> Json<ContextData> {
    Json(context.snapshot())
}

async fn list_identities_handler(
    State(state): State<AppState>,
    context: RequestContext,
    path: std::result::Result<Path<UserId>, PathRejection>,
) -> std::result::Result<Json<IdentityList>, Fault> {
    let Path(user_id) = path?;
    context.require_user_or_unrestricted(user_id)?;
    let providers = state.identities.linked_providers(user_id).await?;
    Ok(Json(IdentityList { user_id, providers }))
}

async fn link_identity_handler(
    State(state): State<AppState>,
    context: RequestContext,
    path: std::result::Result<Path<UserId>, PathRejection>,
    body: std::result::Result<Json<LinkRequest>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, Fault> {
    let Path(user_id) = path?;
    context.require_user_or_unrestricted(user_id)?;
    let Json(request) = body?;
    let mapping = state
        .identities
        .link(user_id, &request.provider, &request.subject)
        .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

async fn unlink_identity_handler(
    State(state): State<AppState>,
    context: RequestContext,
    path: std::result::Result<Path<(UserId, String)>, PathRejection>,
) -> std::result::Result<StatusCode, Fault> {
    let Path((user_id, provider)) = path?;
    context.require_user_or_unrestricted(user_id)?;
    state.identities.unlink(user_id, &provider).await?;
    Ok(StatusCode::NO_CONTENT)
}
