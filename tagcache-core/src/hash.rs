//! Deterministic fingerprinting for cache key compaction.
//!
//! The codec is used in two places: compacting namespaces and logical keys
//! into fixed-width path components, and combining tag version tokens into a
//! metadata hash. It is deliberately non-cryptographic in purpose (no secrets
//! are protected by it) but SHA-256 is used underneath so short inputs cannot
//! be trivially forged into colliding fingerprints.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Number of digest bytes kept for the printable short form.
///
/// 8 bytes (64 bits) keeps physical keys compact while making accidental
/// collisions negligible for cache purposes.
pub const HASH_SIZE_IN_BYTES: usize = 8;

/// Compute the full binary fingerprint of the given bytes.
pub fn binary_hash(data: impl AsRef<[u8]>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data.as_ref());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Compute a short printable fingerprint of the given bytes.
///
/// The result is the first [`HASH_SIZE_IN_BYTES`] bytes of the binary
/// fingerprint, encoded with the URL-safe base64 alphabet without padding,
/// so it is safe to embed as a physical-key path component.
pub fn short_hash(data: impl AsRef<[u8]>) -> String {
    let digest = binary_hash(data);
    URL_SAFE_NO_PAD.encode(&digest[..HASH_SIZE_IN_BYTES])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn short_hash_is_deterministic() {
        assert_eq!(short_hash("foo"), short_hash("foo"));
        assert_eq!(short_hash(b"foo".to_vec()), short_hash("foo"));
    }

    #[test]
    fn short_hash_differs_for_different_inputs() {
        assert_ne!(short_hash("foo"), short_hash("bar"));
        assert_ne!(short_hash(""), short_hash("\0"));
    }

    #[test]
    fn short_hash_is_key_safe() {
        for input in ["", "foo", "a:b:c", "héllo wörld", "\0\x01\x02"] {
            let h = short_hash(input);
            assert!(!h.contains('='));
            assert!(h
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn binary_hash_matches_known_vector() {
        // SHA-256 of the empty string.
        let h = binary_hash("");
        assert_eq!(
            h[..4],
            [0xe3, 0xb0, 0xc4, 0x42],
            "unexpected SHA-256 prefix for empty input"
        );
    }

    proptest! {
        #[test]
        fn short_hash_has_fixed_length(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            // 8 bytes -> 11 base64 characters without padding.
            prop_assert_eq!(short_hash(&data).len(), 11);
        }

        #[test]
        fn short_hash_agrees_with_binary_hash(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let expected = base64::engine::general_purpose::URL_SAFE_NO_PAD
                .encode(&binary_hash(&data)[..HASH_SIZE_IN_BYTES]);
            prop_assert_eq!(short_hash(&data), expected);
        }
    }
}
