//! Bearer credential to principal

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::claims::JwtClaims;
use super::config::CredentialConfig;
use super::error::AuthError;
use super::jwt::TokenVerifier;

/// Identity derived from one verified credential; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// External subject id (`sub`)
    pub subject: String,
    /// Provider name derived from the issuer
    pub provider: String,
    /// Roles, each carrying the configured prefix
    pub roles: BTreeSet<String>,
    /// Tenant the credential was issued for, as opaque text
    pub tenant_claim: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unsigned, wrongly signed, expired, or structurally invalid credential
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// The verifier itself could not run (misconfiguration, key endpoint down)
    #[error("credential verification unavailable: {0}")]
    Unavailable(String),
}

impl From<AuthError> for ParseError {
    fn from(err: AuthError) -> Self {
        if err.is_server_side() {
            Self::Unavailable(err.to_string())
        } else {
            Self::Malformed(err.to_string())
        }
    }
}

/// Decodes bearer credentials into principals
#[derive(Clone)]
pub struct CredentialParser {
    verifier: Arc<dyn TokenVerifier>,
    config: CredentialConfig,
}

impl std::fmt::Debug for CredentialParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialParser")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CredentialParser {
    pub fn new(verifier: Arc<dyn TokenVerifier>, config: CredentialConfig) -> Self {
        Self { verifier, config }
    }

    /// Verify `raw` and map its claims to a [`Principal`]
    pub async fn parse(&self, raw: &str) -> Result<Principal, ParseError> {
        let claims = self.verifier.verify(raw).await?;
        principal_from_claims(&claims, &self.config)
    }
}

/// Map verified claims to a principal. Pure.
pub fn principal_from_claims(
    claims: &JwtClaims,
    config: &CredentialConfig,
) -> Result<Principal, ParseError> {
    let subject = claims.standard.sub.trim();
    if subject.is_empty() {
        return Err(ParseError::Malformed("empty subject".to_string()));
    }

    let provider = config
        .provider_for(claims.standard.iss.as_deref())
        .ok_or_else(|| ParseError::Malformed("no issuer to derive a provider from".to_string()))?;

    let roles = extract_roles(claims.claim(&config.roles_claim), &config.role_prefix)?;

    let tenant_claim = match claims.claim(&config.tenant_claim) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(_) => {
            return Err(ParseError::Malformed(format!(
                "claim '{}' is not a scalar",
                config.tenant_claim
            )));
        }
    };

    Ok(Principal {
        subject: subject.to_string(),
        provider,
        roles,
        tenant_claim,
    })
}

fn extract_roles(value: Option<&Value>, prefix: &str) -> Result<BTreeSet<String>, ParseError> {
    let raw: Vec<&str> = match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(_) => {
            return Err(ParseError::Malformed(
                "roles claim is not a string list".to_string(),
            ));
        }
    };

    Ok(raw
        .into_iter()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| format!("{prefix}{r}"))
        .collect())
}
