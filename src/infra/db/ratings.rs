use async_trait::async_trait;

use crate::application::repos::{RatingSourceRepo, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

// `SUM` over zero rows yields NULL, surfaced as `None`.
#[async_trait]
impl RatingSourceRepo for PostgresRepositories {
    async fn sum_post_ratings(&self, author_id: i64) -> Result<Option<i64>, RepoError> {
        sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT SUM(rating)::BIGINT
            FROM posts
            WHERE author_id = $1
            "#,
        )
        .bind(author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn sum_comment_ratings_by_user(&self, user_id: i64) -> Result<Option<i64>, RepoError> {
        sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT SUM(rating)::BIGINT
            FROM comments
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn sum_comment_ratings_on_author_posts(
        &self,
        author_id: i64,
    ) -> Result<Option<i64>, RepoError> {
        sqlx::query_scalar::<_, Option<i64>>(
            r#"
            SELECT SUM(c.rating)::BIGINT
            FROM comments c
            INNER JOIN posts p ON p.id = c.post_id
            WHERE p.author_id = $1
            "#,
        )
        .bind(author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}
