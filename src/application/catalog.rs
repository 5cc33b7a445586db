//! Read-through views backed by the cache.
//!
//! Each view looks up its key first and falls back to the database on a miss.
//! A failing cache backend is treated as a miss, so reads keep working when
//! the cache does not.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::repos::{CategoriesRepo, PostsRepo, RepoError};
use crate::cache::{CacheConfig, CacheKey, CacheStore, get_json, set_json};
use crate::domain::entities::{CategoryRecord, CategoryWithCounts, PostRecord};
use crate::domain::types::PostType;

pub const RELATED_ARTICLES_LIMIT: u32 = 5;

/// Cached payload of a post detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDetail {
    pub post: PostRecord,
    pub category_ids: Vec<i64>,
}

#[derive(Clone)]
pub struct CatalogService {
    posts: Arc<dyn PostsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    store: Arc<dyn CacheStore>,
    enabled: bool,
    ttl: Duration,
}

impl CatalogService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        store: Arc<dyn CacheStore>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            posts,
            categories,
            store,
            enabled: config.enabled,
            ttl: config.default_ttl(),
        }
    }

    /// All categories, ordered by name.
    pub async fn categories(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        if let Some(cached) = self.lookup(CacheKey::Categories).await {
            return Ok(cached);
        }

        let categories = self.categories.list_all().await?;
        self.fill(CacheKey::Categories, &categories).await;
        Ok(categories)
    }

    /// Categories with per-type post counts. Counts move with every post
    /// write, so they are always read from the database.
    pub async fn category_counts(&self) -> Result<Vec<CategoryWithCounts>, RepoError> {
        self.categories.list_with_counts().await
    }

    /// A post of the given type. A post of the other type is reported as
    /// absent, the same as a missing id.
    pub async fn post_detail(
        &self,
        post_type: PostType,
        id: i64,
    ) -> Result<Option<PostDetail>, RepoError> {
        let key = CacheKey::post_detail(post_type, id);
        if let Some(cached) = self.lookup(key).await {
            return Ok(Some(cached));
        }

        let Some(post) = self.posts.find_by_id(id).await? else {
            return Ok(None);
        };
        if post.post_type != post_type {
            return Ok(None);
        }

        let category_ids = self.posts.list_category_ids(post.id).await?;
        let detail = PostDetail { post, category_ids };
        self.fill(key, &detail).await;
        Ok(Some(detail))
    }

    /// Latest articles filed under a category.
    pub async fn related_articles(&self, category_id: i64) -> Result<Vec<PostRecord>, RepoError> {
        let key = CacheKey::related_articles(category_id);
        if let Some(cached) = self.lookup(key).await {
            return Ok(cached);
        }

        let articles = self
            .posts
            .list_latest_in_category(category_id, PostType::Article, RELATED_ARTICLES_LIMIT)
            .await?;
        self.fill(key, &articles).await;
        Ok(articles)
    }

    async fn lookup<T: DeserializeOwned>(&self, key: CacheKey) -> Option<T> {
        if !self.enabled {
            return None;
        }

        match get_json(self.store.as_ref(), key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                None
            }
            Err(error) => {
                warn!(key = %key, error = %error, "Cache read failed; loading from database");
                None
            }
        }
    }

    async fn fill<T: Serialize + ?Sized>(&self, key: CacheKey, value: &T) {
        if !self.enabled {
            return;
        }

        if let Err(error) = set_json(self.store.as_ref(), key, value, self.ttl).await {
            warn!(key = %key, error = %error, "Cache write failed");
        }
    }
}
