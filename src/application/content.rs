//! Write path for posts, comments and categories.
//!
//! Every mutation commits through the repositories first and only then
//! publishes a cache event, so invalidation never runs ahead of the data it
//! protects. Cache failures are absorbed by the invalidator and never fail a
//! write.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::rating::RatingService;
use crate::application::repos::{
    AuthorsRepo, CategoriesRepo, CategoriesWriteRepo, CommentsRepo, CommentsWriteRepo,
    CreateCommentParams, CreatePostParams, DeletedCategory, PostWithCategories, PostsRepo,
    PostsWriteRepo, RepoError, UpdatePostParams, UpdatedPost,
};
use crate::cache::{CacheTrigger, EntityChange, MutationKind, PostRef};
use crate::domain::entities::{CategoryRecord, CommentRecord, PostRecord};
use crate::domain::error::DomainError;
use crate::domain::types::{PostFilter, PostType, Vote};

pub const TITLE_MAX_CHARS: usize = 200;
pub const CATEGORY_NAME_MAX_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{0}")]
    ConstraintViolation(&'static str),
    #[error("category `{name}` already exists")]
    DuplicateCategory { name: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl ContentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ContentError::Domain(error) if error.is_not_found())
    }
}

/// A category named either by id or by its exact name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryRef {
    Id(i64),
    Name(String),
}

impl From<&str> for CategoryRef {
    /// All-digit input is an id; anything else is a name.
    fn from(value: &str) -> Self {
        let value = value.trim();
        match value.parse::<i64>() {
            Ok(id) if value.bytes().all(|b| b.is_ascii_digit()) => CategoryRef::Id(id),
            _ => CategoryRef::Name(value.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePostCommand {
    pub author_id: i64,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct UpdatePostCommand {
    pub id: i64,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct CreateCommentCommand {
    pub post_id: i64,
    pub user_id: i64,
    pub text: String,
}

/// Repository handles used by the write path.
#[derive(Clone)]
pub struct ContentRepositories {
    pub authors: Arc<dyn AuthorsRepo>,
    pub posts: Arc<dyn PostsRepo>,
    pub posts_write: Arc<dyn PostsWriteRepo>,
    pub categories: Arc<dyn CategoriesRepo>,
    pub categories_write: Arc<dyn CategoriesWriteRepo>,
    pub comments: Arc<dyn CommentsRepo>,
    pub comments_write: Arc<dyn CommentsWriteRepo>,
}

impl ContentRepositories {
    /// Use one adapter for every repository role.
    pub fn from_shared<R>(repo: Arc<R>) -> Self
    where
        R: AuthorsRepo
            + PostsRepo
            + PostsWriteRepo
            + CategoriesRepo
            + CategoriesWriteRepo
            + CommentsRepo
            + CommentsWriteRepo
            + 'static,
    {
        Self {
            authors: repo.clone(),
            posts: repo.clone(),
            posts_write: repo.clone(),
            categories: repo.clone(),
            categories_write: repo.clone(),
            comments: repo.clone(),
            comments_write: repo,
        }
    }
}

#[derive(Clone)]
pub struct ContentService {
    repos: ContentRepositories,
    cache: Arc<CacheTrigger>,
    rating: RatingService,
    recompute_on_write: bool,
}

impl ContentService {
    pub fn new(
        repos: ContentRepositories,
        cache: Arc<CacheTrigger>,
        rating: RatingService,
        recompute_on_write: bool,
    ) -> Self {
        Self {
            repos,
            cache,
            rating,
            recompute_on_write,
        }
    }

    #[instrument(skip(self, command), fields(author_id = command.author_id))]
    pub async fn create_post(&self, command: CreatePostCommand) -> Result<PostRecord, ContentError> {
        let title = normalize_text(&command.title, "title", TITLE_MAX_CHARS)?;
        ensure_non_empty(&command.content, "content")?;

        if self.repos.authors.find_by_id(command.author_id).await?.is_none() {
            return Err(DomainError::not_found("author", command.author_id).into());
        }

        let params = CreatePostParams {
            author_id: command.author_id,
            post_type: command.post_type,
            title,
            content: command.content,
            category_ids: dedup_ids(command.category_ids),
        };

        let PostWithCategories { post, category_ids } = self
            .repos
            .posts_write
            .create_post(params)
            .await?;

        info!(post_id = post.id, post_type = %post.post_type, "Post created");
        self.cache
            .post_changed(MutationKind::Created, PostRef::new(&post, category_ids))
            .await;
        self.after_write([post.author_id]).await;

        Ok(post)
    }

    /// Update a post. Both the categories it had before and after the update
    /// are invalidated, and a type change also clears the old detail key.
    #[instrument(skip(self, command), fields(post_id = command.id))]
    pub async fn update_post(&self, command: UpdatePostCommand) -> Result<PostRecord, ContentError> {
        let title = normalize_text(&command.title, "title", TITLE_MAX_CHARS)?;
        ensure_non_empty(&command.content, "content")?;

        let params = UpdatePostParams {
            id: command.id,
            post_type: command.post_type,
            title,
            content: command.content,
            category_ids: dedup_ids(command.category_ids),
        };

        let UpdatedPost { previous, current } = self
            .repos
            .posts_write
            .update_post(params)
            .await
            .map_err(|err| missing_as(err, "post", command.id))?;
        let PostWithCategories { post, category_ids } = current;

        let mut affected: BTreeSet<i64> = previous.category_ids.iter().copied().collect();
        affected.extend(category_ids.iter().copied());
        let affected: Vec<i64> = affected.into_iter().collect();

        if previous.post.post_type != post.post_type {
            self.cache
                .trigger(
                    MutationKind::Updated,
                    EntityChange::Post(PostRef::new(&previous.post, previous.category_ids)),
                    false,
                )
                .await;
        }

        info!(post_id = post.id, "Post updated");
        self.cache
            .post_changed(MutationKind::Updated, PostRef::new(&post, affected))
            .await;
        self.after_write([post.author_id]).await;

        Ok(post)
    }

    /// Delete a post, invalidating against the categories it had before removal.
    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: i64) -> Result<PostRecord, ContentError> {
        let PostWithCategories { post, category_ids } = self
            .repos
            .posts_write
            .delete_post(id)
            .await
            .map_err(|err| missing_as(err, "post", id))?;

        info!(post_id = post.id, categories = ?category_ids, "Post deleted");
        self.cache
            .post_changed(MutationKind::Deleted, PostRef::new(&post, category_ids))
            .await;
        self.after_write([post.author_id]).await;

        Ok(post)
    }

    pub async fn like_post(&self, id: i64) -> Result<PostRecord, ContentError> {
        self.vote_post(id, Vote::Like).await
    }

    pub async fn dislike_post(&self, id: i64) -> Result<PostRecord, ContentError> {
        self.vote_post(id, Vote::Dislike).await
    }

    #[instrument(skip(self))]
    async fn vote_post(&self, id: i64, vote: Vote) -> Result<PostRecord, ContentError> {
        let post = self
            .repos
            .posts_write
            .adjust_post_rating(id, vote.delta())
            .await
            .map_err(|err| missing_as(err, "post", id))?;
        let category_ids = self.repos.posts.list_category_ids(post.id).await?;

        self.cache
            .post_changed(MutationKind::Updated, PostRef::new(&post, category_ids))
            .await;
        self.after_write([post.author_id]).await;

        Ok(post)
    }

    #[instrument(skip(self, command), fields(post_id = command.post_id, user_id = command.user_id))]
    pub async fn create_comment(
        &self,
        command: CreateCommentCommand,
    ) -> Result<CommentRecord, ContentError> {
        ensure_non_empty(&command.text, "text")?;
        let post = self.load_post(command.post_id).await?;

        let comment = self
            .repos
            .comments_write
            .create_comment(CreateCommentParams {
                post_id: post.id,
                user_id: command.user_id,
                text: command.text.trim().to_string(),
            })
            .await
            .map_err(|err| missing_as(err, "post", post.id))?;

        info!(comment_id = comment.id, "Comment created");
        self.comment_written(MutationKind::Created, &comment, &post)
            .await;

        Ok(comment)
    }

    #[instrument(skip(self))]
    pub async fn delete_comment(&self, id: i64) -> Result<CommentRecord, ContentError> {
        let existing = self
            .repos
            .comments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("comment", id))?;
        let post = self.load_post(existing.post_id).await?;

        let comment = self
            .repos
            .comments_write
            .delete_comment(id)
            .await
            .map_err(|err| missing_as(err, "comment", id))?;

        info!(comment_id = comment.id, "Comment deleted");
        self.comment_written(MutationKind::Deleted, &comment, &post)
            .await;

        Ok(comment)
    }

    pub async fn like_comment(&self, id: i64) -> Result<CommentRecord, ContentError> {
        self.vote_comment(id, Vote::Like).await
    }

    pub async fn dislike_comment(&self, id: i64) -> Result<CommentRecord, ContentError> {
        self.vote_comment(id, Vote::Dislike).await
    }

    #[instrument(skip(self))]
    async fn vote_comment(&self, id: i64, vote: Vote) -> Result<CommentRecord, ContentError> {
        let comment = self
            .repos
            .comments_write
            .adjust_comment_rating(id, vote.delta())
            .await
            .map_err(|err| missing_as(err, "comment", id))?;
        let post = self.load_post(comment.post_id).await?;

        self.comment_written(MutationKind::Updated, &comment, &post)
            .await;

        Ok(comment)
    }

    #[instrument(skip(self))]
    pub async fn create_category(&self, name: &str) -> Result<CategoryRecord, ContentError> {
        let name = normalize_text(name, "name", CATEGORY_NAME_MAX_CHARS)?;

        let category = self
            .repos
            .categories_write
            .create_category(&name)
            .await
            .map_err(|err| duplicate_category(err, &name))?;

        info!(category_id = category.id, "Category created");
        self.cache
            .category_changed(MutationKind::Created, &category)
            .await;

        Ok(category)
    }

    #[instrument(skip(self))]
    pub async fn rename_category(
        &self,
        id: i64,
        name: &str,
    ) -> Result<CategoryRecord, ContentError> {
        let name = normalize_text(name, "name", CATEGORY_NAME_MAX_CHARS)?;

        let category = self
            .repos
            .categories_write
            .rename_category(id, &name)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => DomainError::not_found("category", id).into(),
                other => duplicate_category(other, &name),
            })?;

        info!(category_id = category.id, "Category renamed");
        self.cache
            .category_changed(MutationKind::Updated, &category)
            .await;

        Ok(category)
    }

    /// Delete a category. Posts filed under it lose the category, so each of
    /// them is invalidated against the categories it had before the delete.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: i64) -> Result<CategoryRecord, ContentError> {
        let DeletedCategory { category, posts } = self
            .repos
            .categories_write
            .delete_category(id)
            .await
            .map_err(|err| missing_as(err, "category", id))?;

        info!(category_id = category.id, posts = posts.len(), "Category deleted");
        self.cache
            .posts_changed(MutationKind::Updated, post_refs(&posts))
            .await;
        self.cache
            .category_changed(MutationKind::Deleted, &category)
            .await;

        Ok(category)
    }

    /// Look a category up by id or by name.
    pub async fn find_category(
        &self,
        reference: &CategoryRef,
    ) -> Result<CategoryRecord, ContentError> {
        let found = match reference {
            CategoryRef::Id(id) => self.repos.categories.find_by_id(*id).await?,
            CategoryRef::Name(name) => self.repos.categories.find_by_name(name).await?,
        };
        if let Some(category) = found {
            return Ok(category);
        }

        let error = match reference {
            CategoryRef::Id(id) => DomainError::not_found("category", *id),
            CategoryRef::Name(name) => DomainError::not_found_named("category", name.as_str()),
        };
        Err(error.into())
    }

    /// Delete the posts filed under a category, limited to the filtered type.
    /// Returns the removed posts; an empty category is not an error.
    #[instrument(skip(self))]
    pub async fn delete_posts_in_category(
        &self,
        category_id: i64,
        filter: PostFilter,
    ) -> Result<Vec<PostRecord>, ContentError> {
        self.ensure_category(category_id).await?;

        let removed = self
            .repos
            .posts_write
            .delete_posts_in_category(category_id, filter.post_type())
            .await?;

        if removed.is_empty() {
            info!(category_id, ?filter, "No posts to delete in category");
            return Ok(Vec::new());
        }

        info!(category_id, ?filter, deleted = removed.len(), "Posts deleted from category");
        self.cache
            .posts_changed(MutationKind::Deleted, post_refs(&removed))
            .await;
        self.after_write(removed.iter().map(|entry| entry.post.author_id))
            .await;

        Ok(removed.into_iter().map(|entry| entry.post).collect())
    }

    /// Subscribe a user to a category. Returns `false` when already subscribed.
    pub async fn subscribe(&self, user_id: i64, category_id: i64) -> Result<bool, ContentError> {
        self.ensure_category(category_id).await?;
        let created = self
            .repos
            .categories_write
            .subscribe(user_id, category_id)
            .await?;
        info!(user_id, category_id, created, "Category subscription");
        Ok(created)
    }

    /// Remove a subscription. Returns `false` when none existed.
    pub async fn unsubscribe(&self, user_id: i64, category_id: i64) -> Result<bool, ContentError> {
        self.ensure_category(category_id).await?;
        let removed = self
            .repos
            .categories_write
            .unsubscribe(user_id, category_id)
            .await?;
        info!(user_id, category_id, removed, "Category unsubscription");
        Ok(removed)
    }

    pub async fn subscribers(&self, category_id: i64) -> Result<Vec<i64>, ContentError> {
        self.ensure_category(category_id).await?;
        self.repos
            .categories
            .list_subscribers(category_id)
            .await
            .map_err(ContentError::from)
    }

    async fn ensure_category(&self, id: i64) -> Result<CategoryRecord, ContentError> {
        self.repos
            .categories
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("category", id).into())
    }

    async fn load_post(&self, id: i64) -> Result<PostRecord, ContentError> {
        self.repos
            .posts
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("post", id).into())
    }

    async fn comment_written(
        &self,
        operation: MutationKind,
        comment: &CommentRecord,
        post: &PostRecord,
    ) {
        self.cache
            .comment_changed(operation, comment.id, post.id, post.post_type)
            .await;

        if !self.recompute_on_write {
            return;
        }

        let mut authors = vec![post.author_id];
        match self.repos.authors.find_by_user(comment.user_id).await {
            Ok(Some(commenter)) => authors.push(commenter.id),
            Ok(None) => {}
            Err(error) => warn!(
                user_id = comment.user_id,
                error = %error,
                "Commenter author lookup failed"
            ),
        }
        self.after_write(authors).await;
    }

    /// Recompute ratings for the given authors when configured to. The write
    /// has already committed, so failures are logged rather than returned.
    async fn after_write(&self, authors: impl IntoIterator<Item = i64>) {
        if !self.recompute_on_write {
            return;
        }

        let authors: BTreeSet<i64> = authors.into_iter().collect();
        for author_id in authors {
            if let Err(error) = self.rating.recompute_author_rating(author_id).await {
                warn!(author_id, error = %error, "Rating recompute after write failed");
            }
        }
    }
}

fn post_refs(posts: &[PostWithCategories]) -> Vec<PostRef> {
    posts
        .iter()
        .map(|entry| PostRef::new(&entry.post, entry.category_ids.clone()))
        .collect()
}

fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), ContentError> {
    if value.trim().is_empty() {
        return Err(ContentError::ConstraintViolation(field));
    }
    Ok(())
}

fn normalize_text(value: &str, field: &'static str, max_chars: usize) -> Result<String, ContentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().count() > max_chars {
        return Err(ContentError::ConstraintViolation(field));
    }
    Ok(trimmed.to_string())
}

fn dedup_ids(ids: Vec<i64>) -> Vec<i64> {
    ids.into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn missing_as(err: RepoError, entity: &'static str, id: i64) -> ContentError {
    match err {
        RepoError::NotFound => DomainError::not_found(entity, id).into(),
        other => other.into(),
    }
}

fn duplicate_category(err: RepoError, name: &str) -> ContentError {
    match err {
        RepoError::Duplicate { .. } => ContentError::DuplicateCategory {
            name: name.to_string(),
        },
        other => other.into(),
    }
}
