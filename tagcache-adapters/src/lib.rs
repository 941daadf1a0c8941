//! Reference adapters for the tagcache port contracts.
//!
//! Two families are provided:
//!
//! - **Memory** ([`MemoryStorage`], [`MemoryMetadata`]): in-process
//!   map-backed adapters for single-process and test use, including a lock
//!   table with auto-expiration handled by an owned background sweeper.
//! - **Blackhole** ([`BlackholeStorage`], [`BlackholeMetadata`]): disabled
//!   adapters that always miss and discard writes, used to turn caching off
//!   without changing call sites.
//!
//! Remote store adapters (e.g. a networked key-value service) are external:
//! they only need to implement the same two traits from `tagcache-core`.

pub mod blackhole;
pub mod memory;

pub use blackhole::{BlackholeMetadata, BlackholeStorage};
pub use memory::{MemoryMetadata, MemoryStorage};
