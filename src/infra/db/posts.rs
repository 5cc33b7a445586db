use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;

use crate::{
    application::repos::{
        CreatePostParams, PostWithCategories, PostsRepo, PostsWriteRepo, RepoError,
        UpdatePostParams, UpdatedPost,
    },
    domain::{entities::PostRecord, types::PostType},
};

use super::{PostgresRepositories, map_sqlx_error};

const POST_COLUMNS: &str =
    "id, author_id, post_type, title, content, rating, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    author_id: i64,
    post_type: PostType,
    title: String,
    content: String,
    rating: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            post_type: row.post_type,
            title: row.title,
            content: row.content,
            rating: row.rating,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    async fn category_ids_in(
        tx: &mut Transaction<'_, Postgres>,
        post_id: i64,
    ) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT category_id FROM post_categories WHERE post_id = $1 ORDER BY category_id",
        )
        .bind(post_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)
    }

    /// Lock the posts filed under a category and load each with its
    /// categories.
    pub(super) async fn lock_posts_in_category(
        tx: &mut Transaction<'_, Postgres>,
        category_id: i64,
        post_type: Option<PostType>,
    ) -> Result<Vec<PostWithCategories>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts \
             WHERE id IN (SELECT post_id FROM post_categories WHERE category_id = $1) \
               AND ($2::post_type IS NULL OR post_type = $2) \
             ORDER BY id FOR UPDATE"
        ))
        .bind(category_id)
        .bind(post_type)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        let mut posts = Vec::with_capacity(rows.len());
        for row in rows {
            let category_ids = Self::category_ids_in(&mut *tx, row.id).await?;
            posts.push(PostWithCategories {
                post: row.into(),
                category_ids,
            });
        }
        Ok(posts)
    }

    async fn replace_categories(
        tx: &mut Transaction<'_, Postgres>,
        post_id: i64,
        category_ids: &[i64],
    ) -> Result<(), RepoError> {
        sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;

        if category_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO post_categories (post_id, category_id)
            SELECT $1, category_id FROM UNNEST($2::BIGINT[]) AS t(category_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(post_id)
        .bind(category_ids)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_category_ids(&self, post_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT category_id FROM post_categories WHERE post_id = $1 ORDER BY category_id",
        )
        .bind(post_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn list_latest_in_category(
        &self,
        category_id: i64,
        post_type: PostType,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT p.id, p.author_id, p.post_type, p.title, p.content, p.rating,
                   p.created_at, p.updated_at
            FROM posts p
            INNER JOIN post_categories pc ON pc.post_id = p.id
            WHERE pc.category_id = $1 AND p.post_type = $2
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $3
            "#,
        )
        .bind(category_id)
        .bind(post_type)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(
        &self,
        params: CreatePostParams,
    ) -> Result<PostWithCategories, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (author_id, post_type, title, content) \
             VALUES ($1, $2, $3, $4) RETURNING {POST_COLUMNS}"
        ))
        .bind(params.author_id)
        .bind(params.post_type)
        .bind(&params.title)
        .bind(&params.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_categories(&mut tx, row.id, &params.category_ids).await?;
        let category_ids = Self::category_ids_in(&mut tx, row.id).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PostWithCategories {
            post: row.into(),
            category_ids,
        })
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<UpdatedPost, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let previous = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 FOR UPDATE"
        ))
        .bind(params.id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;
        let previous_category_ids = Self::category_ids_in(&mut tx, previous.id).await?;

        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts \
             SET post_type = $2, title = $3, content = $4, updated_at = now() \
             WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(params.id)
        .bind(params.post_type)
        .bind(&params.title)
        .bind(&params.content)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Self::replace_categories(&mut tx, row.id, &params.category_ids).await?;
        let category_ids = Self::category_ids_in(&mut tx, row.id).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(UpdatedPost {
            previous: PostWithCategories {
                post: previous.into(),
                category_ids: previous_category_ids,
            },
            current: PostWithCategories {
                post: row.into(),
                category_ids,
            },
        })
    }

    async fn delete_post(&self, id: i64) -> Result<PostWithCategories, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let category_ids = Self::category_ids_in(&mut tx, id).await?;
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "DELETE FROM posts WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PostWithCategories {
            post: row.into(),
            category_ids,
        })
    }

    async fn adjust_post_rating(&self, id: i64, delta: i64) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts SET rating = rating + $2 WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_posts_in_category(
        &self,
        category_id: i64,
        post_type: Option<PostType>,
    ) -> Result<Vec<PostWithCategories>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let posts = Self::lock_posts_in_category(&mut tx, category_id, post_type).await?;
        if !posts.is_empty() {
            let ids: Vec<i64> = posts.iter().map(|entry| entry.post.id).collect();
            sqlx::query("DELETE FROM posts WHERE id = ANY($1)")
                .bind(&ids)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(posts)
    }
}
