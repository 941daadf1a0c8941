//! Port contracts implemented by concrete backend adapters.
//!
//! The cache core is store-agnostic: any backend able to satisfy these two
//! contracts (with the stated atomicity for `lock` and for tag-token
//! creation) can sit underneath it. Reference adapters live in the
//! `tagcache-adapters` crate; a remote key-value adapter is an external
//! concern and only has to implement the same traits.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::PortResult;
use crate::token::{LockId, MetadataHash, TagVersion};

/// Minimal byte-oriented key-value store for cached values.
///
/// Implementations must provide their own internal atomicity for a single
/// set/get/delete; no cross-key atomicity is expected.
#[async_trait]
pub trait StoragePort: Send + Sync {
    /// Store bytes under the given physical key.
    ///
    /// `ttl` of `None` means no expiration (an implementation-defined
    /// eviction policy may still apply).
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> PortResult<()>;

    /// Read the bytes stored under the given physical key.
    ///
    /// Returns `None` if the key is missing or expired.
    async fn get(&self, key: &str) -> PortResult<Option<Vec<u8>>>;

    /// Delete the given physical key. Returns true if something was deleted.
    async fn delete(&self, key: &str) -> PortResult<bool>;

    /// Order-preserving batch read.
    async fn mget(&self, keys: &[String]) -> PortResult<Vec<Option<Vec<u8>>>>;

    /// Batch delete; missing keys are ignored.
    async fn mdelete(&self, keys: &[String]) -> PortResult<()>;
}

/// Tag version store and distributed lock primitive, keyed by namespace.
#[async_trait]
pub trait MetadataPort: Send + Sync {
    /// Resolve tag names to their current version tokens, order-preserving.
    ///
    /// A tag that has no token yet gets a fresh random one (create-on-read).
    /// Two concurrent first-reads of the same unseen tag may each persist a
    /// different token; last write wins and the loser's callers observe one
    /// extra, harmless cache miss. `ttl` bounds the token lifetime; an
    /// expired token is regenerated on next access, which is equivalent to
    /// an implicit invalidation.
    async fn get_or_set_tag_values(
        &self,
        namespace: &str,
        tag_names: &[String],
        ttl: Option<Duration>,
    ) -> PortResult<Vec<TagVersion>>;

    /// Replace the tokens of the named tags with fresh random ones.
    async fn invalidate_tags(&self, namespace: &str, tag_names: &[String]) -> PortResult<()>;

    /// Blocking acquire of the lock identified by `(namespace, key,
    /// metadata_hash)`.
    ///
    /// Blocks up to `wait`; returns `None` if the lock could not be acquired
    /// within that budget. `timeout` bounds how long the lock may be held:
    /// once it elapses the lock is force-released and immediately acquirable
    /// by a new caller, even if the original holder crashed. Acquisition is
    /// atomic (test-and-set) across concurrent callers. Implementations must
    /// wait, not spin.
    async fn lock(
        &self,
        namespace: &str,
        key: &str,
        metadata_hash: &MetadataHash,
        timeout: Duration,
        wait: Duration,
    ) -> PortResult<Option<LockId>>;

    /// Release a previously acquired lock.
    ///
    /// Idempotent: releasing an already-expired or already-released lock, or
    /// passing an id that is not the current holder, is not an error.
    async fn unlock(
        &self,
        namespace: &str,
        key: &str,
        metadata_hash: &MetadataHash,
        id: LockId,
    ) -> PortResult<()>;
}
