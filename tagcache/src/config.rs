//! Configuration for a [`TaggedCache`](crate::TaggedCache) instance.

use std::time::Duration;

use tagcache_core::{CacheError, CacheResult};

/// Which reference backend the cache is built on.
///
/// Selected once at construction, never switched at runtime. A custom
/// backend (e.g. a remote key-value service) is injected through
/// [`TaggedCache::with_adapters`](crate::TaggedCache::with_adapters) instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// In-process map-backed adapters (single-process and test use).
    #[default]
    Memory,
    /// Disabled cache: every read misses, every write is discarded.
    Disabled,
}

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace partitioning this instance's keys, tags and locks.
    /// Immutable for the lifetime of the instance.
    pub namespace: String,
    /// Default lifetime for cached values when `set` is called without an
    /// explicit TTL. `None` means no expiration (make sure the backend can
    /// still evict under pressure).
    pub default_ttl: Option<Duration>,
    /// Lifetime for tag version tokens. An expired token regenerates on next
    /// access, which behaves like an implicit invalidation of the tag.
    pub tag_ttl: Option<Duration>,
    /// Reference backend to build on.
    pub backend: Backend,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            default_ttl: Some(Duration::from_secs(3600)),
            tag_ttl: Some(Duration::from_secs(86_400)),
            backend: Backend::default(),
        }
    }
}

impl CacheConfig {
    /// Create a configuration with default lifetimes (1h values, 24h tags)
    /// for the given namespace.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Set the default value lifetime (`None` = no expiration).
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the tag token lifetime (`None` = no expiration).
    pub fn with_tag_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.tag_ttl = ttl;
        self
    }

    /// Select the reference backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Validate the configuration. Misuse is a hard error.
    pub fn validate(&self) -> CacheResult<()> {
        if self.namespace.is_empty() {
            return Err(CacheError::invalid_config("namespace", "must not be empty"));
        }
        if self.default_ttl == Some(Duration::ZERO) {
            return Err(CacheError::invalid_config(
                "default_ttl",
                "must be positive; use None for no expiration",
            ));
        }
        if self.tag_ttl == Some(Duration::ZERO) {
            return Err(CacheError::invalid_config(
                "tag_ttl",
                "must be positive; use None for no expiration",
            ));
        }
        Ok(())
    }
}
