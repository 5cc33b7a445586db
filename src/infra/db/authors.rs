use async_trait::async_trait;

use crate::{
    application::repos::{AuthorsRepo, RepoError},
    domain::entities::AuthorRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AuthorRow {
    id: i64,
    user_id: i64,
    username: String,
    rating: i64,
}

impl From<AuthorRow> for AuthorRecord {
    fn from(row: AuthorRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            rating: row.rating,
        }
    }
}

#[async_trait]
impl AuthorsRepo for PostgresRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT a.id, a.user_id, u.username, a.rating
            FROM authors a
            INNER JOIN users u ON u.id = a.user_id
            WHERE a.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AuthorRecord::from))
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        let row = sqlx::query_as::<_, AuthorRow>(
            r#"
            SELECT a.id, a.user_id, u.username, a.rating
            FROM authors a
            INNER JOIN users u ON u.id = a.user_id
            WHERE a.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(AuthorRecord::from))
    }

    async fn list_ids(&self) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT id FROM authors ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn store_rating(&self, author_id: i64, rating: i64) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE authors SET rating = $2 WHERE id = $1")
            .bind(author_id)
            .bind(rating)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
