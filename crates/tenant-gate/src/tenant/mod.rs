//! Tenant identification and access policy

mod access;
mod extract;
mod id;

pub use access::{TenantAccessDecision, TenantAccessValidator};
pub use extract::{SlugResolver, StaticSlugResolver, TenantExtractor, TenantRejection};
pub use id::TenantId;
