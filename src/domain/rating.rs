//! Author rating formula.
//!
//! An author's rating is always recomputed from source totals, never adjusted
//! incrementally. Posts weigh three times as much as comments.

use serde::Serialize;

/// Weight applied to the sum of the author's own post ratings.
pub const POST_RATING_WEIGHT: i64 = 3;

/// The three aggregate sources an author's rating is computed from.
///
/// `None` mirrors an SQL `SUM` over zero rows and counts as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RatingBreakdown {
    pub own_posts: i64,
    pub own_comments: i64,
    pub received_comments: i64,
}

impl RatingBreakdown {
    pub fn from_sums(
        own_posts: Option<i64>,
        own_comments: Option<i64>,
        received_comments: Option<i64>,
    ) -> Self {
        Self {
            own_posts: own_posts.unwrap_or(0),
            own_comments: own_comments.unwrap_or(0),
            received_comments: received_comments.unwrap_or(0),
        }
    }

    /// `3 × own_posts + own_comments + received_comments`, saturating at the i64 bounds.
    pub fn total(&self) -> i64 {
        self.own_posts
            .saturating_mul(POST_RATING_WEIGHT)
            .saturating_add(self.own_comments)
            .saturating_add(self.received_comments)
    }
}
