//! JWT claims types

use serde::Deserialize;
use serde_json::{Map, Value};

/// Audience can be a single string or array of strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::One(s) => s == value,
            Self::Many(v) => v.iter().any(|s| s == value),
        }
    }
}

/// Registered claims
#[derive(Debug, Clone, Deserialize)]
pub struct StandardClaims {
    pub sub: String,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub aud: Option<OneOrMany>,
    pub exp: i64,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub jti: Option<String>,
}

/// Complete JWT payload: registered claims plus everything else, untyped
///
/// Provider-specific claims (roles, tenant) live at configurable paths, so
/// they are looked up on demand with [`JwtClaims::claim`].
#[derive(Debug, Clone, Deserialize)]
pub struct JwtClaims {
    #[serde(flatten)]
    pub standard: StandardClaims,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JwtClaims {
    /// Look up a claim by dotted path, e.g. `realm_access.roles`
    #[must_use]
    pub fn claim(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        segments.try_fold(self.extra.get(first)?, |value, segment| value.get(segment))
    }
}
