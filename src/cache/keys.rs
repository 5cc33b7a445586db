//! Cache key definitions.
//!
//! Every cache entry name is produced from a typed `CacheKey`, so the write
//! path, the read path and tests can never drift apart on string literals.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::entities::PostRecord;
use crate::domain::types::PostType;

/// Named cache entry.
///
/// `Display` renders the exact key string stored in the cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CacheKey {
    // Per-entity entries
    /// Detail view of one post, e.g. `news_detail_7`.
    PostDetail { post_type: PostType, post_id: i64 },
    /// Related-articles block of one category, e.g. `related_articles_3`.
    RelatedArticles { category_id: i64 },

    // Category-only aggregate
    /// Full category listing.
    Categories,

    // Fixed list/aggregate views invalidated by any post change
    NewsList,
    ArticleList,
    Headers,
    PaginationPage(u8),
    Navigation,
    Footer,
}

impl CacheKey {
    /// Well-known list and aggregate keys that depend on every post.
    pub const POST_LIST_KEYS: [CacheKey; 7] = [
        CacheKey::NewsList,
        CacheKey::ArticleList,
        CacheKey::Headers,
        CacheKey::PaginationPage(1),
        CacheKey::PaginationPage(2),
        CacheKey::Navigation,
        CacheKey::Footer,
    ];

    pub fn post_detail(post_type: PostType, post_id: i64) -> Self {
        CacheKey::PostDetail { post_type, post_id }
    }

    pub fn related_articles(category_id: i64) -> Self {
        CacheKey::RelatedArticles { category_id }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::PostDetail { post_type, post_id } => {
                write!(f, "{}_detail_{post_id}", post_type.as_str())
            }
            CacheKey::RelatedArticles { category_id } => {
                write!(f, "related_articles_{category_id}")
            }
            CacheKey::Categories => f.write_str("categories"),
            CacheKey::NewsList => f.write_str("news_list"),
            CacheKey::ArticleList => f.write_str("article_list"),
            CacheKey::Headers => f.write_str("headers"),
            CacheKey::PaginationPage(page) => write!(f, "pagination_page_{page}"),
            CacheKey::Navigation => f.write_str("navigation"),
            CacheKey::Footer => f.write_str("footer"),
        }
    }
}

/// The slice of a post that cache invalidation depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub id: i64,
    pub post_type: PostType,
    pub author_id: i64,
    pub category_ids: Vec<i64>,
}

impl PostRef {
    pub fn new(post: &PostRecord, category_ids: Vec<i64>) -> Self {
        Self {
            id: post.id,
            post_type: post.post_type,
            author_id: post.author_id,
            category_ids,
        }
    }

    pub fn detail_key(&self) -> CacheKey {
        CacheKey::post_detail(self.post_type, self.id)
    }
}
