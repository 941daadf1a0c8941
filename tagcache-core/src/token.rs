//! Opaque tokens used by the versioned-tag invalidation scheme.
//!
//! A tag never lists the keys it covers. Instead it owns a random
//! [`TagVersion`] token; every stored value's physical location is derived
//! from the tokens of its tags (see [`MetadataHash`]). Invalidating a tag
//! replaces its token, which moves the physical location of every dependent
//! value and orphans the old entries until their own TTL reaps them.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::hash::short_hash;

/// Reserved tag name implicitly included in every value's tag set.
///
/// Invalidating this tag invalidates the whole namespace in O(1). The name is
/// deliberately not a valid "normal" tag so it cannot collide with
/// application tags.
pub const UNIVERSAL_TAG: &str = "@@@all@@@";

/// Size of a tag version token in bytes.
pub const TAG_VERSION_SIZE: usize = 16;

/// Opaque, fixed-size version token owned by a tag.
///
/// The token is random and not interpretable by callers. It changes if and
/// only if the tag has been explicitly invalidated or has never been read
/// before (lazy creation), or its own TTL elapsed (implicit invalidation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TagVersion([u8; TAG_VERSION_SIZE]);

impl TagVersion {
    /// Generate a fresh random token.
    pub fn random() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    /// Reconstruct a token from its raw bytes (adapter use).
    pub fn from_bytes(bytes: [u8; TAG_VERSION_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw token bytes, used as metadata-hash input.
    pub fn as_bytes(&self) -> &[u8; TAG_VERSION_SIZE] {
        &self.0
    }
}

/// Printable fingerprint of a tag set's current version tokens.
///
/// Two resolutions with the same tag *set* (any order, duplicates collapsed)
/// and unchanged underlying tokens produce the same hash; replacing the token
/// of any contributing tag changes it with overwhelming probability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataHash(String);

impl MetadataHash {
    /// Combine version tokens (already in sorted-tag order) into a hash.
    pub fn combine(tokens: &[TagVersion]) -> Self {
        let mut buf = Vec::with_capacity(tokens.len() * TAG_VERSION_SIZE);
        for token in tokens {
            buf.extend_from_slice(token.as_bytes());
        }
        Self(short_hash(&buf))
    }

    /// The printable form, used as a physical-key path component.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetadataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identity of a lock holder.
///
/// Returned by a successful lock acquisition and required to release it, so
/// a caller can never release a lock it does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockId(Uuid);

impl LockId {
    /// Generate a fresh holder identity.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_tokens_differ() {
        assert_ne!(TagVersion::random(), TagVersion::random());
    }

    #[test]
    fn combine_is_order_sensitive() {
        // The metadata service is responsible for sorting tag names before
        // resolving tokens; the combiner itself must be order-sensitive so
        // that distinct token sequences produce distinct hashes.
        let a = TagVersion::random();
        let b = TagVersion::random();
        assert_ne!(MetadataHash::combine(&[a, b]), MetadataHash::combine(&[b, a]));
        assert_eq!(MetadataHash::combine(&[a, b]), MetadataHash::combine(&[a, b]));
    }

    #[test]
    fn combine_reacts_to_any_token_change() {
        let a = TagVersion::random();
        let b = TagVersion::random();
        let before = MetadataHash::combine(&[a, b]);
        assert_ne!(MetadataHash::combine(&[TagVersion::random(), b]), before);
        assert_ne!(MetadataHash::combine(&[a, TagVersion::random()]), before);
    }

    #[test]
    fn lock_ids_are_unique() {
        assert_ne!(LockId::random(), LockId::random());
    }
}
