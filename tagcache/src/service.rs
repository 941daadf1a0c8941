//! Cache service: public operations and the stampede-protected read protocol.
//!
//! [`TaggedCache`] composes the metadata service (tag versions, locks) and
//! the storage service (physical keys, value I/O). Every read/write first
//! resolves the current tag set into a metadata hash, then touches storage
//! under a physical key derived from it; invalidation only rolls tag tokens
//! and never scans stored values.
//!
//! # Degradation
//!
//! Backend failures degrade caching, never the caller: on a broken metadata
//! or storage backend, `get` reports a miss, `set`/`delete`/`invalidate`
//! become no-ops returning `false`, and the stampede protocol falls back to
//! "full miss, no lock". Only argument misuse surfaces as a hard error.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

use tagcache_adapters::{BlackholeMetadata, BlackholeStorage, MemoryMetadata, MemoryStorage};
use tagcache_core::{
    CacheError, CacheResult, LockId, MetadataHash, MetadataPort, StoragePort,
};

use crate::config::{Backend, CacheConfig};
use crate::metadata::MetadataService;
use crate::storage::StorageService;

/// Wait slice for one lock-acquisition attempt inside the retry loop.
///
/// The loop re-reads storage between slices, so a value published by a
/// holder that never releases promptly is still picked up within a slice.
const LOCK_WAIT_SLICE: Duration = Duration::from_secs(1);

/// Handle to a held stampede lock.
///
/// Returned by [`TaggedCache::get_or_lock`] on a full miss when the lock was
/// acquired. The holder must pass it back to [`TaggedCache::release`] after
/// recomputing (success or failure); a leaked handle only blocks other
/// lock-aware callers until the lock's hold timeout expires.
#[derive(Debug)]
pub struct LockHandle {
    id: LockId,
    key: String,
    metadata_hash: MetadataHash,
}

/// Outcome of a stampede-protected read.
#[derive(Debug)]
pub enum LockedRead {
    /// An unlocked read immediately found a value; no lock was touched.
    FullHit {
        /// The cached value.
        value: Vec<u8>,
    },
    /// The initial read missed, but a concurrent holder published the value
    /// while this caller was waiting; any lock acquired along the way has
    /// already been released.
    ContendedHit {
        /// The value published by the concurrent holder.
        value: Vec<u8>,
        /// Time spent waiting before the value appeared.
        waited: Duration,
    },
    /// No value was found.
    ///
    /// With `lock: Some(_)` the caller holds the recompute lock and must
    /// [`release`](TaggedCache::release) it afterward. With `lock: None` the
    /// wait budget ran out without acquiring the lock; the caller recomputes
    /// without exclusivity, preferring availability over strict single-flight.
    FullMiss {
        /// The acquired lock, if any.
        lock: Option<LockHandle>,
        /// Time spent waiting before giving up on a cached value.
        waited: Duration,
    },
}

impl LockedRead {
    /// The cached value, if this outcome carries one.
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            Self::FullHit { value } | Self::ContendedHit { value, .. } => Some(value),
            Self::FullMiss { .. } => None,
        }
    }
}

/// Error from [`TaggedCache::get_or_compute`].
#[derive(Debug, Error)]
pub enum ComputeError<E> {
    /// Argument misuse detected by the cache layer.
    #[error(transparent)]
    Cache(CacheError),
    /// The caller's compute function failed; nothing was written and any
    /// held lock was released.
    #[error("compute failed: {0}")]
    Compute(E),
}

/// Hit/miss counters for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads that found a live value.
    pub hits: u64,
    /// Reads that found nothing (including degraded reads).
    pub misses: u64,
}

impl CacheStats {
    /// Hit rate in `[0.0, 1.0]`; zero when nothing was read yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Default)]
struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StatsCounters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Tag-based cache with O(1) invalidation and stampede-protected reads.
///
/// Cloning is cheap; clones share the same backends and counters. Safe for
/// concurrent use from multiple tasks and threads.
#[derive(Clone)]
pub struct TaggedCache {
    metadata: Arc<MetadataService>,
    storage: Arc<StorageService>,
    stats: Arc<StatsCounters>,
}

impl TaggedCache {
    /// Build a cache on one of the reference backends.
    ///
    /// Must be called inside a Tokio runtime when the memory backend is
    /// selected (its lock sweeper is spawned at construction).
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        let (storage, metadata): (Arc<dyn StoragePort>, Arc<dyn MetadataPort>) =
            match config.backend {
                Backend::Memory => (
                    Arc::new(MemoryStorage::new()),
                    Arc::new(MemoryMetadata::new()),
                ),
                Backend::Disabled => (
                    Arc::new(BlackholeStorage::new()),
                    Arc::new(BlackholeMetadata::new()),
                ),
            };
        Self::with_adapters(config, storage, metadata)
    }

    /// Build a cache on caller-provided adapters (remote backends, tests).
    pub fn with_adapters(
        config: CacheConfig,
        storage: Arc<dyn StoragePort>,
        metadata: Arc<dyn MetadataPort>,
    ) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self {
            metadata: Arc::new(MetadataService::new(
                metadata,
                config.namespace.clone(),
                config.tag_ttl,
            )),
            storage: Arc::new(StorageService::new(
                storage,
                &config.namespace,
                config.default_ttl,
            )),
            stats: Arc::new(StatsCounters::default()),
        })
    }

    /// The namespace this instance is bound to.
    pub fn namespace(&self) -> &str {
        self.metadata.namespace()
    }

    /// Hit/miss counters since construction.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Resolve the metadata hash, degrading backend failures to `None`.
    async fn try_resolve(&self, tags: &[String]) -> Option<MetadataHash> {
        match self.metadata.resolve_metadata_hash(tags).await {
            Ok(hash) => Some(hash),
            Err(err) => {
                tracing::warn!(error = %err, "metadata unavailable, treating as cache miss");
                None
            }
        }
    }

    /// Read storage, degrading backend failures to a miss.
    async fn try_get(&self, key: &str, hash: &MetadataHash) -> Option<Vec<u8>> {
        match self.storage.get(key, hash).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(error = %err, "storage unavailable, treating as cache miss");
                None
            }
        }
    }

    /// Store a value under the given key and tags.
    ///
    /// `ttl` of `None` uses the instance-wide default;
    /// [`NO_EXPIRATION`](crate::storage::NO_EXPIRATION) disables expiration.
    /// Returns false if the write was degraded to a no-op.
    pub async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        tags: &[String],
        ttl: Option<Duration>,
    ) -> bool {
        let Some(hash) = self.try_resolve(tags).await else {
            return false;
        };
        tracing::debug!(key, tags = ?tags, "set value");
        match self.storage.set(key, &hash, value, ttl).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "storage unavailable, write dropped");
                false
            }
        }
    }

    /// Read the value for the given key and tags.
    ///
    /// `None` is a cache miss (absent, expired, invalidated, or backend
    /// unavailable); an empty stored value comes back as `Some(vec![])`.
    pub async fn get(&self, key: &str, tags: &[String]) -> Option<Vec<u8>> {
        let Some(hash) = self.try_resolve(tags).await else {
            self.stats.miss();
            return None;
        };
        let value = self.try_get(key, &hash).await;
        match &value {
            Some(_) => self.stats.hit(),
            None => self.stats.miss(),
        }
        value
    }

    /// Delete the entry for the given key and tags.
    ///
    /// Returns true if something was deleted; an absent key is not an error.
    pub async fn delete(&self, key: &str, tags: &[String]) -> bool {
        let Some(hash) = self.try_resolve(tags).await else {
            return false;
        };
        tracing::debug!(key, tags = ?tags, "delete value");
        match self.storage.delete(key, &hash).await {
            Ok(deleted) => deleted,
            Err(err) => {
                tracing::warn!(error = %err, "storage unavailable, delete dropped");
                false
            }
        }
    }

    /// Invalidate every value carrying any of the given tags. O(1) in the
    /// number of affected keys. Returns false if degraded to a no-op.
    pub async fn invalidate_tags(&self, tags: &[String]) -> bool {
        match self.metadata.invalidate_tags(tags).await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "metadata unavailable, invalidation dropped");
                false
            }
        }
    }

    /// Invalidate the whole namespace in O(1) by rolling the universal tag.
    pub async fn invalidate_all(&self) -> bool {
        match self.metadata.invalidate_all().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, "metadata unavailable, invalidation dropped");
                false
            }
        }
    }

    /// Stampede-protected read.
    ///
    /// On a miss, enters a bounded wait loop that alternates lock-acquisition
    /// attempts (each incurring the lock primitive's own blocking wait, never
    /// a busy loop) with storage re-reads, so a value published by a
    /// concurrent holder is returned instead of being recomputed. See
    /// [`LockedRead`] for the four possible outcomes.
    ///
    /// `lock_timeout` bounds how long an acquired lock may be held before
    /// auto-expiration and must be positive; `wait_budget` bounds how long
    /// this call may block. Backend failures degrade to
    /// `FullMiss { lock: None }`.
    pub async fn get_or_lock(
        &self,
        key: &str,
        tags: &[String],
        lock_timeout: Duration,
        wait_budget: Duration,
    ) -> CacheResult<LockedRead> {
        if lock_timeout == Duration::ZERO {
            return Err(CacheError::invalid_config(
                "lock_timeout",
                "must be positive",
            ));
        }

        let Some(hash) = self.try_resolve(tags).await else {
            self.stats.miss();
            return Ok(LockedRead::FullMiss {
                lock: None,
                waited: Duration::ZERO,
            });
        };

        // First try without any lock.
        if let Some(value) = self.try_get(key, &hash).await {
            self.stats.hit();
            return Ok(LockedRead::FullHit { value });
        }

        let start = Instant::now();
        loop {
            let remaining = wait_budget.saturating_sub(start.elapsed());
            let slice = remaining.min(LOCK_WAIT_SLICE);
            let attempt_started = Instant::now();
            let lock_id = match self
                .metadata
                .acquire_lock(key, &hash, lock_timeout, slice)
                .await
            {
                Ok(id) => id,
                Err(err) => {
                    tracing::warn!(error = %err, "metadata unavailable during lock acquisition");
                    None
                }
            };
            // A failing or nonconforming backend can return well before the
            // slice elapses; pad the attempt out to its slice so the loop
            // polls instead of spinning against it.
            if lock_id.is_none() {
                tokio::time::sleep_until(attempt_started + slice).await;
            }
            let waited = start.elapsed();

            // Mandatory anti-dogpile re-read: whether or not the lock was
            // acquired, a concurrent holder may have published the value
            // while we were waiting.
            if let Some(value) = self.try_get(key, &hash).await {
                if let Some(id) = lock_id {
                    self.release_lock_id(key, &hash, id).await;
                }
                self.stats.hit();
                return Ok(LockedRead::ContendedHit { value, waited });
            }

            if let Some(id) = lock_id {
                self.stats.miss();
                return Ok(LockedRead::FullMiss {
                    lock: Some(LockHandle {
                        id,
                        key: key.to_string(),
                        metadata_hash: hash,
                    }),
                    waited,
                });
            }

            if waited >= wait_budget {
                self.stats.miss();
                return Ok(LockedRead::FullMiss { lock: None, waited });
            }
        }
    }

    /// Release a lock obtained from [`get_or_lock`](Self::get_or_lock).
    ///
    /// Idempotent at the backend: releasing an already-expired lock is fine.
    pub async fn release(&self, handle: LockHandle) {
        self.release_lock_id(&handle.key, &handle.metadata_hash, handle.id)
            .await;
    }

    async fn release_lock_id(&self, key: &str, hash: &MetadataHash, id: LockId) {
        if let Err(err) = self.metadata.release_lock(key, hash, id).await {
            tracing::warn!(error = %err, key, "lock release failed; it will auto-expire");
        }
    }

    /// Read the value or compute and store it under stampede protection.
    ///
    /// On a full miss, `compute` runs (with the lock held when it could be
    /// acquired), its result is stored, and the lock is released only after
    /// the store so waiters' re-reads find the value. If `compute` fails the
    /// lock is still released and nothing is written.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: &str,
        tags: &[String],
        ttl: Option<Duration>,
        lock_timeout: Duration,
        wait_budget: Duration,
        compute: F,
    ) -> Result<Vec<u8>, ComputeError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, E>>,
    {
        let read = self
            .get_or_lock(key, tags, lock_timeout, wait_budget)
            .await
            .map_err(ComputeError::Cache)?;
        let lock = match read {
            LockedRead::FullHit { value } | LockedRead::ContendedHit { value, .. } => {
                return Ok(value)
            }
            LockedRead::FullMiss { lock, .. } => lock,
        };

        match compute().await {
            Ok(value) => {
                self.set(key, value.clone(), tags, ttl).await;
                if let Some(handle) = lock {
                    self.release(handle).await;
                }
                Ok(value)
            }
            Err(err) => {
                if let Some(handle) = lock {
                    self.release(handle).await;
                }
                Err(ComputeError::Compute(err))
            }
        }
    }
}
