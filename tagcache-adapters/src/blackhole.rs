//! Disabled/no-op adapters.
//!
//! Wire these in to turn caching off without changing call sites: every read
//! misses, every write is silently discarded, and the lock primitive always
//! "succeeds" immediately (a disabled cache has nothing to protect from a
//! stampede).

use std::time::Duration;

use async_trait::async_trait;

use tagcache_core::{LockId, MetadataHash, MetadataPort, PortResult, StoragePort, TagVersion};

/// [`StoragePort`] that stores nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackholeStorage;

impl BlackholeStorage {
    /// Create a no-op storage adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StoragePort for BlackholeStorage {
    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> PortResult<()> {
        Ok(())
    }

    async fn get(&self, _key: &str) -> PortResult<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn delete(&self, _key: &str) -> PortResult<bool> {
        Ok(false)
    }

    async fn mget(&self, keys: &[String]) -> PortResult<Vec<Option<Vec<u8>>>> {
        Ok(vec![None; keys.len()])
    }

    async fn mdelete(&self, _keys: &[String]) -> PortResult<()> {
        Ok(())
    }
}

/// [`MetadataPort`] that remembers nothing.
///
/// Tag resolutions return fresh random tokens on every call, so no two
/// metadata hashes ever match and every dependent read is a miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackholeMetadata;

impl BlackholeMetadata {
    /// Create a no-op metadata adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataPort for BlackholeMetadata {
    async fn get_or_set_tag_values(
        &self,
        _namespace: &str,
        tag_names: &[String],
        _ttl: Option<Duration>,
    ) -> PortResult<Vec<TagVersion>> {
        Ok(tag_names.iter().map(|_| TagVersion::random()).collect())
    }

    async fn invalidate_tags(&self, _namespace: &str, _tag_names: &[String]) -> PortResult<()> {
        Ok(())
    }

    async fn lock(
        &self,
        _namespace: &str,
        _key: &str,
        _metadata_hash: &MetadataHash,
        _timeout: Duration,
        _wait: Duration,
    ) -> PortResult<Option<LockId>> {
        Ok(Some(LockId::random()))
    }

    async fn unlock(
        &self,
        _namespace: &str,
        _key: &str,
        _metadata_hash: &MetadataHash,
        _id: LockId,
    ) -> PortResult<()> {
        Ok(())
    }
}
