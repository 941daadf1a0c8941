//! Metadata service: tag-version lifecycle and metadata-hash computation.
//!
//! This is the invalidation engine. It never touches stored values:
//! invalidating a tag only replaces that tag's version token, which changes
//! the metadata hash computed for every key depending on it and thereby moves
//! those keys' physical locations. The abandoned entries expire via their own
//! TTL.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tagcache_core::{
    CacheError, CacheResult, LockId, MetadataHash, MetadataPort, TagVersion, UNIVERSAL_TAG,
};

/// Owns the tag-version lifecycle for one namespace.
pub struct MetadataService {
    adapter: Arc<dyn MetadataPort>,
    namespace: String,
    tag_ttl: Option<Duration>,
}

impl MetadataService {
    /// Create a metadata service bound to the given namespace.
    pub fn new(
        adapter: Arc<dyn MetadataPort>,
        namespace: impl Into<String>,
        tag_ttl: Option<Duration>,
    ) -> Self {
        Self {
            adapter,
            namespace: namespace.into(),
            tag_ttl,
        }
    }

    /// The namespace this service is bound to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Normalize a tag set: collapse duplicates, add the universal tag, sort.
    ///
    /// The sorted order is what makes the metadata hash insensitive to the
    /// caller's tag ordering.
    fn normalized_tag_names(tag_names: &[String]) -> Vec<String> {
        let mut set: BTreeSet<&str> = tag_names.iter().map(String::as_str).collect();
        set.insert(UNIVERSAL_TAG);
        set.into_iter().map(str::to_string).collect()
    }

    /// Resolve the current tag tokens for a normalized tag-name list.
    async fn tag_values(&self, tag_names: &[String]) -> CacheResult<Vec<TagVersion>> {
        self.adapter
            .get_or_set_tag_values(&self.namespace, tag_names, self.tag_ttl)
            .await
            .map_err(CacheError::metadata)
    }

    /// Compute the metadata hash for the given tag set.
    ///
    /// May lazily create version tokens for tags never seen before. Two calls
    /// with the same tag *set* (any order, duplicates collapsed) and the same
    /// underlying tokens return the same hash.
    pub async fn resolve_metadata_hash(&self, tag_names: &[String]) -> CacheResult<MetadataHash> {
        let normalized = Self::normalized_tag_names(tag_names);
        let tokens = self.tag_values(&normalized).await?;
        Ok(MetadataHash::combine(&tokens))
    }

    /// Replace each named tag's token with a freshly generated one.
    pub async fn invalidate_tags(&self, tag_names: &[String]) -> CacheResult<()> {
        for tag_name in tag_names {
            if tag_name == UNIVERSAL_TAG {
                tracing::debug!(namespace = %self.namespace, "invalidating whole namespace");
            } else {
                tracing::debug!(namespace = %self.namespace, tag = %tag_name, "invalidating tag");
            }
        }
        self.adapter
            .invalidate_tags(&self.namespace, tag_names)
            .await
            .map_err(CacheError::metadata)
    }

    /// Invalidate the whole namespace by rolling the universal tag.
    pub async fn invalidate_all(&self) -> CacheResult<()> {
        self.invalidate_tags(&[UNIVERSAL_TAG.to_string()]).await
    }

    /// Attempt to acquire the per-`(key, metadata_hash)` lock, blocking up to
    /// `wait`. Returns `None` if not acquired within the budget; `timeout`
    /// bounds the hold before auto-expiration.
    pub async fn acquire_lock(
        &self,
        key: &str,
        metadata_hash: &MetadataHash,
        timeout: Duration,
        wait: Duration,
    ) -> CacheResult<Option<LockId>> {
        self.adapter
            .lock(&self.namespace, key, metadata_hash, timeout, wait)
            .await
            .map_err(CacheError::metadata)
    }

    /// Release a previously acquired lock. Idempotent.
    pub async fn release_lock(
        &self,
        key: &str,
        metadata_hash: &MetadataHash,
        id: LockId,
    ) -> CacheResult<()> {
        self.adapter
            .unlock(&self.namespace, key, metadata_hash, id)
            .await
            .map_err(CacheError::metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tagcache_adapters::MemoryMetadata;

    fn service() -> MetadataService {
        MetadataService::new(Arc::new(MemoryMetadata::new()), "test", None)
    }

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn hash_is_insensitive_to_order_and_duplicates() {
        let service = service();
        let h1 = service
            .resolve_metadata_hash(&tags(&["tag1", "tag2"]))
            .await
            .unwrap();
        let h2 = service
            .resolve_metadata_hash(&tags(&["tag2", "tag1"]))
            .await
            .unwrap();
        let h3 = service
            .resolve_metadata_hash(&tags(&["tag1", "tag2", "tag1"]))
            .await
            .unwrap();
        assert_eq!(h1, h2);
        assert_eq!(h1, h3);
    }

    #[tokio::test]
    async fn hash_changes_with_tag_set() {
        let service = service();
        let h1 = service
            .resolve_metadata_hash(&tags(&["tag1", "tag2"]))
            .await
            .unwrap();
        let h2 = service
            .resolve_metadata_hash(&tags(&["tag1", "tag2", "tag3"]))
            .await
            .unwrap();
        assert_ne!(h1, h2);
    }

    #[tokio::test]
    async fn invalidation_only_affects_containing_sets() {
        let service = service();
        let with_t3 = tags(&["tag1", "tag2", "tag3"]);
        let without_t3 = tags(&["tag1", "tag2"]);
        let h_with = service.resolve_metadata_hash(&with_t3).await.unwrap();
        let h_without = service.resolve_metadata_hash(&without_t3).await.unwrap();

        service.invalidate_tags(&tags(&["tag3"])).await.unwrap();

        assert_ne!(service.resolve_metadata_hash(&with_t3).await.unwrap(), h_with);
        assert_eq!(
            service.resolve_metadata_hash(&without_t3).await.unwrap(),
            h_without
        );
    }

    #[tokio::test]
    async fn invalidate_all_changes_every_hash() {
        let service = service();
        let a = tags(&["tag1"]);
        let b = tags(&["tag2", "tag3"]);
        let empty: Vec<String> = Vec::new();
        let h_a = service.resolve_metadata_hash(&a).await.unwrap();
        let h_b = service.resolve_metadata_hash(&b).await.unwrap();
        let h_empty = service.resolve_metadata_hash(&empty).await.unwrap();

        service.invalidate_all().await.unwrap();

        assert_ne!(service.resolve_metadata_hash(&a).await.unwrap(), h_a);
        assert_ne!(service.resolve_metadata_hash(&b).await.unwrap(), h_b);
        assert_ne!(service.resolve_metadata_hash(&empty).await.unwrap(), h_empty);
    }

    #[tokio::test]
    async fn double_invalidation_is_consistent() {
        let service = service();
        let t = tags(&["tag1"]);
        let h0 = service.resolve_metadata_hash(&t).await.unwrap();
        service.invalidate_tags(&tags(&["tag1"])).await.unwrap();
        let h1 = service.resolve_metadata_hash(&t).await.unwrap();
        service.invalidate_tags(&tags(&["tag1"])).await.unwrap();
        let h2 = service.resolve_metadata_hash(&t).await.unwrap();
        assert_ne!(h0, h1);
        assert_ne!(h1, h2);
        assert_ne!(h0, h2);
        // Stable between invalidations.
        assert_eq!(service.resolve_metadata_hash(&t).await.unwrap(), h2);
    }

    #[tokio::test]
    async fn lock_round_trip() {
        let service = service();
        let hash = service.resolve_metadata_hash(&tags(&["t"])).await.unwrap();
        let id = service
            .acquire_lock("key1", &hash, Duration::from_secs(5), Duration::from_millis(100))
            .await
            .unwrap()
            .expect("uncontended acquire");
        service.release_lock("key1", &hash, id).await.unwrap();
    }

    proptest! {
        #[test]
        fn normalization_is_set_semantics(
            mut names in proptest::collection::vec("[a-z]{1,8}", 0..8)
        ) {
            let forward = MetadataService::normalized_tag_names(&names);
            names.reverse();
            names.extend(names.clone()); // duplicate everything
            let shuffled = MetadataService::normalized_tag_names(&names);
            prop_assert_eq!(&forward, &shuffled);
            prop_assert!(forward.iter().any(|t| t == UNIVERSAL_TAG));
            prop_assert!(forward.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
