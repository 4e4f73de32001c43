//! Paths exempt from tenant and credential enforcement

use crate::constants::{DEFAULT_PUBLIC_EXACT, DEFAULT_PUBLIC_PREFIXES};

/// Public allow-list: prefix matches for ops and docs, exact matches otherwise
///
/// Prefix matching is segment-aware: `/health` covers `/health` and
/// `/health/live`, not `/healthcheck`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicRoutes {
    prefixes: Vec<String>,
    exact: Vec<String>,
}

impl Default for PublicRoutes {
    fn default() -> Self {
        Self::new(
            DEFAULT_PUBLIC_PREFIXES.iter().map(ToString::to_string),
            DEFAULT_PUBLIC_EXACT.iter().map(ToString::to_string),
        )
    }
}

impl PublicRoutes {
    pub fn new(
        prefixes: impl IntoIterator<Item = String>,
        exact: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            exact: exact.into_iter().collect(),
        }
    }

    /// Nothing is public
    #[must_use]
    pub const fn none() -> Self {
        Self {
            prefixes: Vec::new(),
            exact: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        if self.exact.iter().any(|p| p == path) {
            return true;
        }
        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}
