//! Cache key types and factory methods

use std::fmt;

/// Cache key namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// External identity to internal user resolution
    Identity,
    /// Custom namespace for extensions
    Custom,
}

impl CacheNamespace {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "ident",
            Self::Custom => "custom",
        }
    }

    /// Prefix shared by every key in this namespace, for bulk invalidation
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }
}

/// Structured cache key with namespace isolation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: CacheNamespace,
    identifier: String,
    variant: Option<String>,
}

impl CacheKey {
    /// Key for an (provider, subject) identity resolution.
    ///
    /// The provider segment is escaped so that a `:` inside it can never
    /// shift the boundary between provider and subject.
    #[must_use]
    pub fn identity(provider: &str, subject: &str) -> Self {
        Self {
            namespace: CacheNamespace::Identity,
            identifier: escape_segment(provider),
            variant: Some(subject.to_string()),
        }
    }

    /// Create a custom cache key
    #[must_use]
    pub fn custom(identifier: &str, variant: Option<&str>) -> Self {
        Self {
            namespace: CacheNamespace::Custom,
            identifier: identifier.to_string(),
            variant: variant.map(ToString::to_string),
        }
    }

    #[must_use]
    pub const fn namespace(&self) -> CacheNamespace {
        self.namespace
    }

    /// Leading segment of the key: the escaped provider for identity keys
    ///
    /// Never includes the subject, so it is safe to log.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.identifier
    }

    /// Convert to string key for storage
    #[must_use]
    pub fn to_key_string(&self) -> String {
        let mut key = format!("{}:{}", self.namespace.as_str(), self.identifier);
        if let Some(ref variant) = self.variant {
            key.push(':');
            key.push_str(variant);
        }
        key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_key_string())
    }
}

fn escape_segment(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key() {
        let key = CacheKey::identity("keycloak", "abc");
        assert_eq!(key.namespace(), CacheNamespace::Identity);
        assert_eq!(key.to_key_string(), "ident:keycloak:abc");
        assert_eq!(key.scope(), "keycloak");
    }

    #[test]
    fn test_identity_key_is_case_sensitive() {
        let key1 = CacheKey::identity("keycloak", "abc");
        let key2 = CacheKey::identity("keycloak", "ABC");
        assert_ne!(key1.to_key_string(), key2.to_key_string());
    }

    #[test]
    fn test_identity_key_separator_cannot_collide() {
        let key1 = CacheKey::identity("a:b", "c");
        let key2 = CacheKey::identity("a", "b:c");
        assert_ne!(key1.to_key_string(), key2.to_key_string());
        assert_eq!(key1.to_key_string(), "ident:a%3Ab:c");
    }

    #[test]
    fn test_identity_keys_share_namespace_prefix() {
        let key = CacheKey::identity("google", "xyz");
        assert!(
            key.to_key_string()
                .starts_with(&CacheNamespace::Identity.prefix())
        );
    }

    #[test]
    fn test_custom_key() {
        let key = CacheKey::custom("my-data", Some("v1"));
        assert_eq!(key.to_key_string(), "custom:my-data:v1");
        assert_eq!(CacheKey::custom("flag", None).to_key_string(), "custom:flag");
    }

    #[test]
    fn test_display_impl() {
        let key = CacheKey::identity("keycloak", "abc");
        assert_eq!(format!("{key}"), "ident:keycloak:abc");
    }

    #[test]
    fn test_namespace_as_str() {
        assert_eq!(CacheNamespace::Identity.as_str(), "ident");
        assert_eq!(CacheNamespace::Custom.as_str(), "custom");
        assert_eq!(CacheNamespace::Identity.prefix(), "ident:");
    }
}
