//! Bearer credential verification
//!
//! # Features
//!
//! - JWT validation with HS256/384/512 via `jsonwebtoken`
//! - RS*/ES* validation through a JWKS cache with background key rotation
//!   (`jwks` feature)
//! - Claim mapping to a [`Principal`]: configurable roles claim path, role
//!   prefixing, tenant claim, and issuer to provider naming
//!
//! Raw tokens and secrets never reach the logs.

mod claims;
mod config;
mod error;
#[cfg(feature = "jwks")]
mod jwks;
mod jwt;
mod principal;

pub use claims::{JwtClaims, OneOrMany, StandardClaims};
pub use config::{CredentialConfig, JwtConfig};
pub use error::{AuthError, Result};
#[cfg(feature = "jwks")]
pub use jwks::{JwkSet, JwksCache, JwksRefreshTask};
pub use jwt::{JwtValidator, TokenVerifier};
pub use principal::{CredentialParser, ParseError, Principal, principal_from_claims};
