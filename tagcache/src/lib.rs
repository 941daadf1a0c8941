//! tagcache - tag-based cache invalidation with stampede-protected reads.
//!
//! Callers store byte values under application-chosen keys, attach zero or
//! more string tags, and can invalidate every value carrying a given tag in
//! O(1) - without scanning, without tag membership lists, and without
//! coordinating with other processes beyond a shared key-value store.
//!
//! # How invalidation works
//!
//! Every tag owns an opaque random version token. A value's physical storage
//! key is derived from the current tokens of its tags (plus an implicit
//! universal tag), so rolling one token moves the physical location of every
//! dependent value; the old entries are orphaned and expire via their own
//! TTL. Reads and writes under an invalidated tag set simply land somewhere
//! else.
//!
//! # Stampede protection
//!
//! [`TaggedCache::get_or_lock`] implements an anti-dogpile protocol: a miss
//! enters a bounded wait loop alternating lock-acquisition attempts with
//! storage re-reads, so only one caller recomputes while the others pick up
//! the published value. See [`LockedRead`] for the outcomes and
//! [`TaggedCache::get_or_compute`] for a closure-based wrapper with
//! guaranteed lock release.
//!
//! # Example
//!
//! ```
//! use tagcache::{CacheConfig, TaggedCache};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let cache = TaggedCache::new(CacheConfig::new("app")).unwrap();
//! let tags = vec!["user:42".to_string(), "articles".to_string()];
//!
//! cache.set("article:7", b"rendered".to_vec(), &tags, None).await;
//! assert!(cache.get("article:7", &tags).await.is_some());
//!
//! // O(1), no matter how many values carry the tag.
//! cache.invalidate_tags(&["articles".to_string()]).await;
//! assert!(cache.get("article:7", &tags).await.is_none());
//! # }
//! ```

pub mod config;
pub mod metadata;
pub mod service;
pub mod storage;

pub use config::{Backend, CacheConfig};
pub use metadata::MetadataService;
pub use service::{CacheStats, ComputeError, LockHandle, LockedRead, TaggedCache};
pub use storage::{StorageService, NO_EXPIRATION};

// Re-export the core contracts and adapters so most users only need this crate.
pub use tagcache_adapters::{BlackholeMetadata, BlackholeStorage, MemoryMetadata, MemoryStorage};
pub use tagcache_core::{
    CacheError, CacheResult, LockId, MetadataHash, MetadataPort, PortError, PortResult,
    StoragePort, TagVersion, UNIVERSAL_TAG,
};
