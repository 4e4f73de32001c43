//! Constants for the tenant gate

/// Default request header carrying the tenant identifier
pub const DEFAULT_TENANT_HEADER: &str = "X-Tenant-Id";

/// Marker prepended to every role taken from a credential, keeping token
/// roles apart from framework-internal authority names
pub const ROLE_PREFIX: &str = "ROLE_";

/// Default dotted claim path holding the principal's roles
pub const DEFAULT_ROLES_CLAIM: &str = "realm_access.roles";

/// Default claim name holding the principal's tenant
pub const DEFAULT_TENANT_CLAIM: &str = "tenant_id";

/// Bearer scheme prefix in the `Authorization` header
pub const BEARER_PREFIX: &str = "Bearer ";

/// Public path prefixes (ops and API documentation)
pub const DEFAULT_PUBLIC_PREFIXES: &[&str] = &["/health", "/docs", "/api-docs"];

/// Public paths matched exactly
pub const DEFAULT_PUBLIC_EXACT: &[&str] = &["/api/v1/public/ping"];

/// Client-visible message for unexpected faults
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Service name used when none is configured
pub const DEFAULT_SERVICE_NAME: &str = "tenant-gate";
