//! Cache configuration types

use std::str::FromStr;
use std::time::Duration;

/// Identity values are 16-byte user ids; anything bigger is a bug upstream
pub const DEFAULT_MAX_VALUE_SIZE: usize = 1024;

/// Default lifetime of a cached identity resolution
pub const DEFAULT_IDENTITY_TTL: Duration = Duration::from_secs(600);

/// Default capacity of the in-memory cache
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cache backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    Noop,
    #[default]
    Memory,
}

impl FromStr for CacheBackend {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "noop" | "none" | "disabled" => Self::Noop,
            _ => Self::Memory,
        })
    }
}

/// Cache configuration
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,
    /// Cache backend type
    pub backend: CacheBackend,
    /// TTL for identity resolutions
    pub identity_ttl: Duration,
    /// Maximum entries for in-memory cache
    pub max_entries: Option<usize>,
    /// Maximum size of a single cached value in bytes
    pub max_value_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            identity_ttl: DEFAULT_IDENTITY_TTL,
            max_entries: Some(DEFAULT_MAX_ENTRIES),
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
        }
    }

    #[must_use]
    pub const fn disabled() -> Self {
        let mut config = Self::new();
        config.enabled = false;
        config
    }
}
