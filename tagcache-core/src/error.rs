//! Error taxonomy for tagcache operations.
//!
//! A broken cache backend degrades the availability of *caching*, never the
//! caller's own correctness path. Port failures are therefore caught at the
//! service boundary and converted into cache misses / no-ops; only
//! programming misuse surfaces as a hard error.
//!
//! A cache miss is not an error at all: reads return `Option<Vec<u8>>`,
//! which also distinguishes "no value" (`None`) from "value is empty"
//! (`Some(vec![])`).

use thiserror::Error;

/// Failure reported by a port implementation (backend unreachable/erroring).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("backend unavailable: {reason}")]
pub struct PortError {
    /// Human-readable description of the backend failure.
    pub reason: String,
}

impl PortError {
    /// Build a port error from any displayable cause.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Cache-layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The metadata backend (tag versions, locks) is unreachable or erroring.
    ///
    /// The cache service treats this as a full cache miss with no write
    /// performed, never as a crash.
    #[error("metadata unavailable: {reason}")]
    MetadataUnavailable { reason: String },

    /// The value storage backend is unreachable or erroring.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    /// Programming misuse (malformed configuration, invalid timeouts).
    ///
    /// Unlike backend failures this is a hard error: it is never degraded
    /// into a miss because it indicates a bug at the call site.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl CacheError {
    /// Wrap a metadata port failure.
    pub fn metadata(err: PortError) -> Self {
        Self::MetadataUnavailable { reason: err.reason }
    }

    /// Wrap a storage port failure.
    pub fn storage(err: PortError) -> Self {
        Self::StorageUnavailable { reason: err.reason }
    }

    /// Build a misuse error for the given configuration field or argument.
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for backend failures that the cache service degrades instead of
    /// propagating.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnavailable { .. } | Self::StorageUnavailable { .. }
        )
    }
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result alias for port operations.
pub type PortResult<T> = Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_distinguishable_conditions() {
        let meta = CacheError::metadata(PortError::new("connection refused"));
        let storage = CacheError::storage(PortError::new("connection refused"));
        assert_ne!(meta, storage);
        assert!(meta.is_degradable());
        assert!(storage.is_degradable());
    }

    #[test]
    fn misuse_is_not_degradable() {
        let err = CacheError::invalid_config("namespace", "must not be empty");
        assert!(!err.is_degradable());
        assert_eq!(
            err.to_string(),
            "invalid configuration for namespace: must not be empty"
        );
    }
}
