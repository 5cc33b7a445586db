use async_trait::async_trait;

use crate::{
    application::repos::{CategoriesRepo, CategoriesWriteRepo, DeletedCategory, RepoError},
    domain::entities::{CategoryRecord, CategoryWithCounts},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
}

impl From<CategoryRow> for CategoryRecord {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryCountsRow {
    id: i64,
    name: String,
    news_count: i64,
    articles_count: i64,
}

#[async_trait]
impl CategoriesRepo for PostgresRepositories {
    async fn find_by_id(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CategoryRecord>, RepoError> {
        let row =
            sqlx::query_as::<_, CategoryRow>("SELECT id, name FROM categories WHERE name = $1")
                .bind(name)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(row.map(CategoryRecord::from))
    }

    async fn list_all(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CategoryRecord::from).collect())
    }

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCounts>, RepoError> {
        let rows = sqlx::query_as::<_, CategoryCountsRow>(
            r#"
            SELECT
                c.id,
                c.name,
                COUNT(p.id) FILTER (WHERE p.post_type = 'news') AS news_count,
                COUNT(p.id) FILTER (WHERE p.post_type = 'article') AS articles_count
            FROM categories c
            LEFT JOIN post_categories pc ON pc.category_id = c.id
            LEFT JOIN posts p ON p.id = pc.post_id
            GROUP BY c.id, c.name
            ORDER BY c.name
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryWithCounts {
                id: row.id,
                name: row.name,
                news_count: row.news_count,
                articles_count: row.articles_count,
            })
            .collect())
    }

    async fn list_subscribers(&self, category_id: i64) -> Result<Vec<i64>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM subscriptions WHERE category_id = $1 ORDER BY user_id",
        )
        .bind(category_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}

#[async_trait]
impl CategoriesWriteRepo for PostgresRepositories {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn rename_category(&self, id: i64, name: &str) -> Result<CategoryRecord, RepoError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_category(&self, id: i64) -> Result<DeletedCategory, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let posts = Self::lock_posts_in_category(&mut tx, id, None).await?;
        let row = sqlx::query_as::<_, CategoryRow>(
            "DELETE FROM categories WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(DeletedCategory {
            category: row.into(),
            posts,
        })
    }

    async fn subscribe(&self, user_id: i64, category_id: i64) -> Result<bool, RepoError> {
        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, category_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, category_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(category_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn unsubscribe(&self, user_id: i64, category_id: i64) -> Result<bool, RepoError> {
        let result =
            sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND category_id = $2")
                .bind(user_id)
                .bind(category_id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }
}
