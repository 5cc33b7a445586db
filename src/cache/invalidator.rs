//! Eager cache invalidation.
//!
//! Deletes every key derived from a changed entity. Backend failures are
//! logged and counted but never returned: the database write that triggered
//! the invalidation has already committed and must not be failed by the cache.

use std::collections::BTreeSet;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::domain::entities::CategoryRecord;

use super::keys::{CacheKey, PostRef};
use super::registry;
use super::store::CacheStore;

const METRIC_INVALIDATED: &str = "newsportal_cache_invalidated_total";
const METRIC_INVALIDATION_FAILED: &str = "newsportal_cache_invalidation_failed_total";

/// Outcome of one invalidation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Keys the backend acknowledged as deleted (or already absent).
    pub deleted: Vec<CacheKey>,
    /// Keys whose deletion failed; they may serve stale data until their TTL.
    pub failed: Vec<CacheKey>,
}

impl InvalidationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: InvalidationReport) {
        self.deleted.extend(other.deleted);
        self.failed.extend(other.failed);
    }
}

#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<dyn CacheStore>,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Evict the post's detail view, every post list, and the related-articles
    /// block of each category currently associated with the post.
    pub async fn invalidate_for_post_change(&self, post: &PostRef) -> InvalidationReport {
        self.invalidate_keys(registry::keys_for_post(post)).await
    }

    /// Evict the cached category listing.
    pub async fn invalidate_for_category_change(
        &self,
        category: &CategoryRecord,
    ) -> InvalidationReport {
        self.invalidate_keys(registry::keys_for_category(category.id))
            .await
    }

    pub async fn invalidate_keys(&self, keys: BTreeSet<CacheKey>) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        for key in keys {
            let name = key.to_string();
            match self.store.delete(&name).await {
                Ok(()) => {
                    debug!(cache_key = %name, "cache entry invalidated");
                    counter!(METRIC_INVALIDATED).increment(1);
                    report.deleted.push(key);
                }
                Err(error) => {
                    warn!(
                        cache_key = %name,
                        error = %error,
                        "cache invalidation failed; entry may be stale until it expires"
                    );
                    counter!(METRIC_INVALIDATION_FAILED).increment(1);
                    report.failed.push(key);
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::{CacheError, MemoryStore};
    use crate::domain::types::PostType;

    struct UnreachableStore;

    #[async_trait]
    impl CacheStore for UnreachableStore {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
            Err(CacheError::unavailable("connection refused"))
        }

        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::unavailable("connection refused"))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::unavailable("connection refused"))
        }
    }

    async fn seed(store: &MemoryStore, keys: &[CacheKey]) {
        for key in keys {
            store
                .set(&key.to_string(), Bytes::from_static(b"cached"), Duration::ZERO)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn post_change_evicts_detail_lists_and_own_categories() {
        let store = Arc::new(MemoryStore::new(&CacheConfig::default()));
        let invalidator = CacheInvalidator::new(store.clone());

        let mut seeded = vec![
            CacheKey::post_detail(PostType::News, 7),
            CacheKey::related_articles(1),
            CacheKey::related_articles(2),
            CacheKey::related_articles(3),
            CacheKey::Categories,
        ];
        seeded.extend(CacheKey::POST_LIST_KEYS);
        seed(&store, &seeded).await;

        let post = PostRef {
            id: 7,
            post_type: PostType::News,
            author_id: 1,
            category_ids: vec![1, 2],
        };
        let report = invalidator.invalidate_for_post_change(&post).await;

        assert!(report.is_clean());
        assert!(!store.contains("news_detail_7"));
        assert!(!store.contains("related_articles_1"));
        assert!(!store.contains("related_articles_2"));
        for key in CacheKey::POST_LIST_KEYS {
            assert!(!store.contains(&key.to_string()), "{key} still cached");
        }
        assert!(store.contains("related_articles_3"));
        assert!(store.contains("categories"));
    }

    #[tokio::test]
    async fn category_change_evicts_listing_only() {
        let store = Arc::new(MemoryStore::new(&CacheConfig::default()));
        let invalidator = CacheInvalidator::new(store.clone());
        seed(
            &store,
            &[CacheKey::Categories, CacheKey::NewsList, CacheKey::related_articles(4)],
        )
        .await;

        let category = CategoryRecord {
            id: 4,
            name: "Science".to_string(),
        };
        let report = invalidator.invalidate_for_category_change(&category).await;

        assert_eq!(report.deleted, vec![CacheKey::Categories]);
        assert!(!store.contains("categories"));
        assert!(store.contains("news_list"));
        assert!(store.contains("related_articles_4"));
    }

    #[tokio::test]
    async fn invalidating_empty_cache_is_idempotent() {
        let store = Arc::new(MemoryStore::new(&CacheConfig::default()));
        let invalidator = CacheInvalidator::new(store);
        let post = PostRef {
            id: 1,
            post_type: PostType::Article,
            author_id: 1,
            category_ids: vec![],
        };

        let first = invalidator.invalidate_for_post_change(&post).await;
        let second = invalidator.invalidate_for_post_change(&post).await;
        assert!(first.is_clean());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn backend_failure_is_reported_not_raised() {
        let invalidator = CacheInvalidator::new(Arc::new(UnreachableStore));
        let post = PostRef {
            id: 7,
            post_type: PostType::News,
            author_id: 1,
            category_ids: vec![3],
        };

        let report = invalidator.invalidate_for_post_change(&post).await;

        assert!(!report.is_clean());
        assert!(report.deleted.is_empty());
        assert_eq!(report.failed.len(), 1 + CacheKey::POST_LIST_KEYS.len() + 1);
    }
}
