//! Storage service: physical key derivation and value I/O.
//!
//! Translates `(logical key, metadata hash)` into a physical storage key and
//! delegates unchanged to the storage port. A logical key's physical location
//! moves whenever any of its tags is invalidated (the metadata hash changes);
//! the old location is abandoned and expires via its own TTL.

use std::sync::Arc;
use std::time::Duration;

use tagcache_core::{short_hash, CacheError, CacheResult, MetadataHash, StoragePort};

/// Explicit "no expiration" sentinel for [`StorageService::set`].
///
/// `ttl = None` means "use the service-wide default"; this constant opts out
/// of expiration entirely.
pub const NO_EXPIRATION: Duration = Duration::MAX;

/// Reads and writes values under physical keys derived from the namespace
/// fingerprint, the logical key fingerprint and the metadata hash.
pub struct StorageService {
    adapter: Arc<dyn StoragePort>,
    namespace_hash: String,
    default_ttl: Option<Duration>,
}

impl StorageService {
    /// Create a storage service bound to the given namespace.
    pub fn new(
        adapter: Arc<dyn StoragePort>,
        namespace: &str,
        default_ttl: Option<Duration>,
    ) -> Self {
        Self {
            adapter,
            namespace_hash: short_hash(namespace),
            default_ttl,
        }
    }

    /// Compute the physical storage key for a logical key and metadata hash.
    ///
    /// Format: `tc:{namespace_hash}:v:{key_hash}:{metadata_hash}`.
    pub fn physical_key(&self, key: &str, metadata_hash: &MetadataHash) -> String {
        format!(
            "tc:{}:v:{}:{}",
            self.namespace_hash,
            short_hash(key),
            metadata_hash
        )
    }

    /// Resolve the effective TTL for a write.
    ///
    /// `None` falls back to the service-wide default; [`NO_EXPIRATION`]
    /// disables expiration for this entry.
    fn resolve_ttl(&self, ttl: Option<Duration>) -> Option<Duration> {
        match ttl {
            None => self.default_ttl,
            Some(ttl) if ttl == NO_EXPIRATION => None,
            Some(ttl) => Some(ttl),
        }
    }

    /// Store a value for the given key and metadata hash.
    pub async fn set(
        &self,
        key: &str,
        metadata_hash: &MetadataHash,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> CacheResult<()> {
        let physical_key = self.physical_key(key, metadata_hash);
        self.adapter
            .set(&physical_key, value, self.resolve_ttl(ttl))
            .await
            .map_err(CacheError::storage)
    }

    /// Read the value for the given key and metadata hash.
    ///
    /// `None` means the key is absent (missing, expired or orphaned by an
    /// invalidation); an empty stored value comes back as `Some(vec![])`.
    pub async fn get(&self, key: &str, metadata_hash: &MetadataHash) -> CacheResult<Option<Vec<u8>>> {
        let physical_key = self.physical_key(key, metadata_hash);
        self.adapter
            .get(&physical_key)
            .await
            .map_err(CacheError::storage)
    }

    /// Delete the value for the given key and metadata hash.
    ///
    /// Returns true if something was deleted; an absent key is not an error.
    pub async fn delete(&self, key: &str, metadata_hash: &MetadataHash) -> CacheResult<bool> {
        let physical_key = self.physical_key(key, metadata_hash);
        self.adapter
            .delete(&physical_key)
            .await
            .map_err(CacheError::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagcache_adapters::MemoryStorage;
    use tagcache_core::TagVersion;

    fn hash() -> MetadataHash {
        MetadataHash::combine(&[TagVersion::random()])
    }

    fn service() -> StorageService {
        StorageService::new(Arc::new(MemoryStorage::new()), "test", None)
    }

    #[test]
    fn physical_key_embeds_all_components() {
        let service = service();
        let h = hash();
        let key = service.physical_key("key1", &h);
        assert!(key.starts_with("tc:"));
        assert!(key.contains(":v:"));
        assert!(key.ends_with(h.as_str()));
        // The logical key is fingerprinted, never embedded raw.
        assert!(!key.contains("key1"));
    }

    #[test]
    fn physical_key_moves_with_metadata_hash() {
        let service = service();
        let h1 = hash();
        let h2 = hash();
        assert_ne!(service.physical_key("key1", &h1), service.physical_key("key1", &h2));
        assert_ne!(service.physical_key("key1", &h1), service.physical_key("key2", &h1));
    }

    #[test]
    fn namespaces_partition_the_key_space() {
        let adapter: Arc<dyn StoragePort> = Arc::new(MemoryStorage::new());
        let a = StorageService::new(Arc::clone(&adapter), "ns-a", None);
        let b = StorageService::new(adapter, "ns-b", None);
        let h = hash();
        assert_ne!(a.physical_key("key1", &h), b.physical_key("key1", &h));
    }

    #[tokio::test]
    async fn round_trip_and_delete() {
        let service = service();
        let h = hash();
        service.set("key1", &h, b"v1".to_vec(), None).await.unwrap();
        assert_eq!(service.get("key1", &h).await.unwrap(), Some(b"v1".to_vec()));
        assert!(service.delete("key1", &h).await.unwrap());
        assert!(!service.delete("key1", &h).await.unwrap());
        assert_eq!(service.get("key1", &h).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn default_ttl_applies_when_unset() {
        let service = StorageService::new(
            Arc::new(MemoryStorage::new()),
            "test",
            Some(Duration::from_secs(1)),
        );
        let h = hash();
        service.set("short", &h, b"v".to_vec(), None).await.unwrap();
        service
            .set("pinned", &h, b"v".to_vec(), Some(NO_EXPIRATION))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(service.get("short", &h).await.unwrap(), None);
        assert_eq!(service.get("pinned", &h).await.unwrap(), Some(b"v".to_vec()));
    }
}
