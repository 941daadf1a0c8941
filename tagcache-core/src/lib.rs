//! tagcache core - tokens, hash codec, error taxonomy and port contracts.
//!
//! This crate holds everything the service layer and the backend adapters
//! share: the opaque version tokens driving lazy tag invalidation, the
//! fingerprinting codec used for key-space compaction, the error taxonomy,
//! and the two capability contracts ([`StoragePort`], [`MetadataPort`]) that
//! concrete backends implement.
//!
//! # Design
//!
//! Invalidation is lazy: a tag owns a random version token instead of a
//! membership list. Stored values live under a physical key derived from the
//! current tokens of their tags, so replacing one token makes every dependent
//! value unreachable in O(1) - the old entries are orphaned, not deleted, and
//! expire via their own TTL.

pub mod error;
pub mod hash;
pub mod ports;
pub mod token;

pub use error::{CacheError, CacheResult, PortError, PortResult};
pub use hash::{binary_hash, short_hash, HASH_SIZE_IN_BYTES};
pub use ports::{MetadataPort, StoragePort};
pub use token::{LockId, MetadataHash, TagVersion, TAG_VERSION_SIZE, UNIVERSAL_TAG};
