use thiserror::Error;

use crate::store::StoreError;

/// Identity resolution and linking failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("No identity mapping for {provider} subject")]
    NotFound { provider: String },

    #[error("Identity conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IdentityError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type IdentityResult<T> = Result<T, IdentityError>;
