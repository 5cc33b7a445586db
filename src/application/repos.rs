//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{
    AuthorRecord, CategoryRecord, CategoryWithCounts, CommentRecord, PostRecord,
};
use crate::domain::types::PostType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: i64,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// A post together with the categories it belonged to at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostWithCategories {
    pub post: PostRecord,
    pub category_ids: Vec<i64>,
}

/// Result of a post update: the post and its categories as they were before
/// the write, read inside the same transaction, and as they are after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatedPost {
    pub previous: PostWithCategories,
    pub current: PostWithCategories,
}

/// A deleted category with the posts that were filed under it, each carrying
/// the categories it had before the delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedCategory {
    pub category: CategoryRecord,
    pub posts: Vec<PostWithCategories>,
}

/// Aggregate sum queries backing the author rating.
///
/// Each method returns `None` when the underlying `SUM` ran over zero rows.
#[async_trait]
pub trait RatingSourceRepo: Send + Sync {
    async fn sum_post_ratings(&self, author_id: i64) -> Result<Option<i64>, RepoError>;

    async fn sum_comment_ratings_by_user(&self, user_id: i64) -> Result<Option<i64>, RepoError>;

    async fn sum_comment_ratings_on_author_posts(
        &self,
        author_id: i64,
    ) -> Result<Option<i64>, RepoError>;
}

#[async_trait]
pub trait AuthorsRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError>;

    async fn find_by_user(&self, user_id: i64) -> Result<Option<AuthorRecord>, RepoError>;

    async fn list_ids(&self) -> Result<Vec<i64>, RepoError>;

    async fn store_rating(&self, author_id: i64, rating: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError>;

    async fn list_category_ids(&self, post_id: i64) -> Result<Vec<i64>, RepoError>;

    /// Most recent posts of the given type in a category, newest first.
    async fn list_latest_in_category(
        &self,
        category_id: i64,
        post_type: PostType,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams)
    -> Result<PostWithCategories, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<UpdatedPost, RepoError>;

    /// Deletes the post and returns it with the categories it had before deletion.
    async fn delete_post(&self, id: i64) -> Result<PostWithCategories, RepoError>;

    async fn adjust_post_rating(&self, id: i64, delta: i64) -> Result<PostRecord, RepoError>;

    /// Deletes every post filed under the category, optionally restricted to
    /// one post type. Each removed post carries its categories from before
    /// the delete.
    async fn delete_posts_in_category(
        &self,
        category_id: i64,
        post_type: Option<PostType>,
    ) -> Result<Vec<PostWithCategories>, RepoError>;
}

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<CategoryRecord>, RepoError>;

    /// Every category ordered by name.
    async fn list_all(&self) -> Result<Vec<CategoryRecord>, RepoError>;

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCounts>, RepoError>;

    async fn list_subscribers(&self, category_id: i64) -> Result<Vec<i64>, RepoError>;
}

#[async_trait]
pub trait CategoriesWriteRepo: Send + Sync {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError>;

    async fn rename_category(&self, id: i64, name: &str) -> Result<CategoryRecord, RepoError>;

    async fn delete_category(&self, id: i64) -> Result<DeletedCategory, RepoError>;

    /// Returns `false` when the user was already subscribed.
    async fn subscribe(&self, user_id: i64, category_id: i64) -> Result<bool, RepoError>;

    /// Returns `false` when no subscription existed.
    async fn unsubscribe(&self, user_id: i64, category_id: i64) -> Result<bool, RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsWriteRepo: Send + Sync {
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    async fn delete_comment(&self, id: i64) -> Result<CommentRecord, RepoError>;

    async fn adjust_comment_rating(&self, id: i64, delta: i64)
    -> Result<CommentRecord, RepoError>;
}
