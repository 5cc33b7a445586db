//! Shared domain enumerations aligned with persisted database enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminator between the two kinds of publications (mirrors Postgres enum `post_type`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "post_type", rename_all = "snake_case")]
pub enum PostType {
    News,
    Article,
}

impl PostType {
    pub fn as_str(self) -> &'static str {
        match self {
            PostType::News => "news",
            PostType::Article => "article",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which publications a bulk operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFilter {
    News,
    Articles,
    All,
}

impl PostFilter {
    /// The single post type selected, or `None` for every type.
    pub fn post_type(self) -> Option<PostType> {
        match self {
            PostFilter::News => Some(PostType::News),
            PostFilter::Articles => Some(PostType::Article),
            PostFilter::All => None,
        }
    }
}

/// A single like or dislike applied to a post or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    /// Rating delta applied by this vote. Ratings are unbounded.
    pub fn delta(self) -> i64 {
        match self {
            Vote::Like => 1,
            Vote::Dislike => -1,
        }
    }
}
