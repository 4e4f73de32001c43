//! Request-scoped tenant and identity authorization for multi-tenant HTTP
//! services

pub mod auth;
pub mod cache;
pub mod config;
mod constants;
pub mod context;
mod error;
pub mod fault;
pub mod identity;
pub mod observability;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod tenant;
#[cfg(test)]
mod test_support;

pub use auth::{CredentialParser, JwtConfig, JwtValidator, Principal, TokenVerifier};
pub use cache::{CacheBackend, CacheConfig, CacheProvider, create_cache};
pub use config::{Config, ConfigBuilder, TelemetryConfig};
pub use context::{ContextData, RequestContext};
pub use error::{Error, Result};
pub use fault::{ErrorBody, Fault};
pub use identity::{IdentityMapping, IdentityResolver, UserId};
pub use pipeline::{Authorization, AuthorizationPipeline, PublicRoutes};
pub use server::{build_pipeline, build_router, serve};
pub use store::InMemoryStore;
pub use tenant::{TenantAccessValidator, TenantExtractor, TenantId};
