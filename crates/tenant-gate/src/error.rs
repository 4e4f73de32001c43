use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Seed error: {0}")]
    Seed(#[from] StoreError),
}

impl Error {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_predicate() {
        let err = Error::Config("invalid config".to_string());
        assert!(err.is_config());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_predicate() {
        let err = Error::Transport("connection refused".to_string());
        assert!(err.is_transport());
        assert!(!err.is_config());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Config("missing issuer".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing issuer");

        let err = Error::Transport("bind failed".to_string());
        assert!(err.to_string().contains("bind failed"));
    }

    #[test]
    fn test_seed_error_from_store() {
        let err: Error = StoreError::Duplicate("keycloak:abc".to_string()).into();
        assert!(err.to_string().contains("Seed error"));
        assert!(err.to_string().contains("keycloak:abc"));
    }
}
