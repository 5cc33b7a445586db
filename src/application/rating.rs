//! Author rating aggregation.
//!
//! Recomputes an author's rating from the three aggregate sources and
//! persists it. Each recompute is a read-then-write with no lock: two
//! concurrent recomputes for one author race and the later write wins, which
//! is acceptable because both compute from committed totals.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::application::repos::{AuthorsRepo, RatingSourceRepo, RepoError};
use crate::domain::entities::AuthorRecord;
use crate::domain::error::DomainError;
use crate::domain::rating::RatingBreakdown;

const METRIC_RATING_RECOMPUTE_MS: &str = "newsportal_rating_recompute_ms";

#[derive(Debug, Error)]
pub enum RatingError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl RatingError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RatingError::Domain(DomainError::NotFound { .. }))
    }
}

/// Totals of a bulk recompute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    pub recomputed: usize,
    pub failed: Vec<i64>,
}

#[derive(Clone)]
pub struct RatingService {
    authors: Arc<dyn AuthorsRepo>,
    sources: Arc<dyn RatingSourceRepo>,
}

impl RatingService {
    pub fn new(authors: Arc<dyn AuthorsRepo>, sources: Arc<dyn RatingSourceRepo>) -> Self {
        Self { authors, sources }
    }

    async fn load_author(&self, author_id: i64) -> Result<AuthorRecord, RatingError> {
        self.authors
            .find_by_id(author_id)
            .await?
            .ok_or_else(|| DomainError::not_found("author", author_id).into())
    }

    async fn compute(&self, author: &AuthorRecord) -> Result<RatingBreakdown, RatingError> {
        let own_posts = self.sources.sum_post_ratings(author.id).await?;
        let own_comments = self
            .sources
            .sum_comment_ratings_by_user(author.user_id)
            .await?;
        let received_comments = self
            .sources
            .sum_comment_ratings_on_author_posts(author.id)
            .await?;

        Ok(RatingBreakdown::from_sums(
            own_posts,
            own_comments,
            received_comments,
        ))
    }

    /// Current rating components without persisting anything.
    pub async fn breakdown(&self, author_id: i64) -> Result<RatingBreakdown, RatingError> {
        let author = self.load_author(author_id).await?;
        self.compute(&author).await
    }

    /// Recompute the author's rating from source totals and store it.
    #[instrument(skip(self))]
    pub async fn recompute_author_rating(&self, author_id: i64) -> Result<i64, RatingError> {
        let started_at = Instant::now();
        let author = self.load_author(author_id).await?;
        let breakdown = self.compute(&author).await?;
        let rating = breakdown.total();

        self.authors.store_rating(author.id, rating).await?;

        info!(
            author_id,
            previous = author.rating,
            rating,
            own_posts = breakdown.own_posts,
            own_comments = breakdown.own_comments,
            received_comments = breakdown.received_comments,
            "Author rating recomputed"
        );
        histogram!(METRIC_RATING_RECOMPUTE_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        Ok(rating)
    }

    /// Recompute every author. A failure for one author is logged and the
    /// run continues with the next.
    #[instrument(skip(self))]
    pub async fn recompute_all(&self) -> Result<RecomputeSummary, RatingError> {
        let mut summary = RecomputeSummary::default();

        for author_id in self.authors.list_ids().await? {
            match self.recompute_author_rating(author_id).await {
                Ok(_) => summary.recomputed += 1,
                Err(error) => {
                    warn!(author_id, error = %error, "Author rating recompute failed");
                    summary.failed.push(author_id);
                }
            }
        }

        info!(
            recomputed = summary.recomputed,
            failed = summary.failed.len(),
            "Bulk rating recompute finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct FakeRepo {
        authors: Mutex<HashMap<i64, AuthorRecord>>,
        post_sums: HashMap<i64, i64>,
        user_comment_sums: HashMap<i64, i64>,
        received_sums: HashMap<i64, i64>,
        failing_author: Option<i64>,
    }

    impl FakeRepo {
        fn with_author(mut self, id: i64, user_id: i64) -> Self {
            self.authors.get_mut().unwrap().insert(
                id,
                AuthorRecord {
                    id,
                    user_id,
                    username: format!("user{user_id}"),
                    rating: 0,
                },
            );
            self
        }

        fn stored_rating(&self, id: i64) -> i64 {
            self.authors.lock().unwrap()[&id].rating
        }
    }

    #[async_trait]
    impl AuthorsRepo for FakeRepo {
        async fn find_by_id(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
            Ok(self.authors.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_user(&self, user_id: i64) -> Result<Option<AuthorRecord>, RepoError> {
            Ok(self
                .authors
                .lock()
                .unwrap()
                .values()
                .find(|a| a.user_id == user_id)
                .cloned())
        }

        async fn list_ids(&self) -> Result<Vec<i64>, RepoError> {
            let mut ids: Vec<i64> = self.authors.lock().unwrap().keys().copied().collect();
            ids.sort_unstable();
            Ok(ids)
        }

        async fn store_rating(&self, author_id: i64, rating: i64) -> Result<(), RepoError> {
            if self.failing_author == Some(author_id) {
                return Err(RepoError::Timeout);
            }
            let mut authors = self.authors.lock().unwrap();
            let author = authors.get_mut(&author_id).ok_or(RepoError::NotFound)?;
            author.rating = rating;
            Ok(())
        }
    }

    #[async_trait]
    impl RatingSourceRepo for FakeRepo {
        async fn sum_post_ratings(&self, author_id: i64) -> Result<Option<i64>, RepoError> {
            Ok(self.post_sums.get(&author_id).copied())
        }

        async fn sum_comment_ratings_by_user(
            &self,
            user_id: i64,
        ) -> Result<Option<i64>, RepoError> {
            Ok(self.user_comment_sums.get(&user_id).copied())
        }

        async fn sum_comment_ratings_on_author_posts(
            &self,
            author_id: i64,
        ) -> Result<Option<i64>, RepoError> {
            Ok(self.received_sums.get(&author_id).copied())
        }
    }

    fn service(repo: Arc<FakeRepo>) -> RatingService {
        RatingService::new(repo.clone(), repo)
    }

    #[tokio::test]
    async fn author_without_activity_rates_zero() {
        let repo = Arc::new(FakeRepo::default().with_author(1, 100));
        let rating = service(repo.clone()).recompute_author_rating(1).await.unwrap();
        assert_eq!(rating, 0);
        assert_eq!(repo.stored_rating(1), 0);
    }

    #[tokio::test]
    async fn recompute_applies_weights_and_persists() {
        let mut repo = FakeRepo::default().with_author(1, 100);
        repo.post_sums.insert(1, 10);
        repo.user_comment_sums.insert(100, 5);
        repo.received_sums.insert(1, 2);
        let repo = Arc::new(repo);

        let rating = service(repo.clone()).recompute_author_rating(1).await.unwrap();
        assert_eq!(rating, 37);
        assert_eq!(repo.stored_rating(1), 37);
    }

    #[tokio::test]
    async fn recompute_is_idempotent() {
        let mut repo = FakeRepo::default().with_author(1, 100);
        repo.post_sums.insert(1, -4);
        let repo = Arc::new(repo);
        let service = service(repo);

        let first = service.recompute_author_rating(1).await.unwrap();
        let second = service.recompute_author_rating(1).await.unwrap();
        assert_eq!(first, -12);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_author_is_not_found() {
        let repo = Arc::new(FakeRepo::default());
        let error = service(repo).recompute_author_rating(9).await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn breakdown_does_not_persist() {
        let mut repo = FakeRepo::default().with_author(1, 100);
        repo.post_sums.insert(1, 3);
        let repo = Arc::new(repo);

        let breakdown = service(repo.clone()).breakdown(1).await.unwrap();
        assert_eq!(breakdown.total(), 9);
        assert_eq!(repo.stored_rating(1), 0);
    }

    #[tokio::test]
    async fn recompute_all_continues_past_failures() {
        let mut repo = FakeRepo::default()
            .with_author(1, 100)
            .with_author(2, 200)
            .with_author(3, 300);
        repo.failing_author = Some(2);
        repo.post_sums.insert(3, 1);
        let repo = Arc::new(repo);

        let summary = service(repo.clone()).recompute_all().await.unwrap();
        assert_eq!(summary.recomputed, 2);
        assert_eq!(summary.failed, vec![2]);
        assert_eq!(repo.stored_rating(3), 3);
    }
}
