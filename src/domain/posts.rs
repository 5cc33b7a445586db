//! Presentation-independent helpers over post records.

use time::{Duration, OffsetDateTime};

use crate::domain::entities::PostRecord;

const PREVIEW_CHARS: usize = 150;
const SHORT_TITLE_CHARS: usize = 50;
const POPULAR_RATING_THRESHOLD: i64 = 100;
const RECENT_WINDOW: Duration = Duration::days(7);

impl PostRecord {
    /// First 150 characters of the content, suffixed with `...` when truncated.
    pub fn preview(&self) -> String {
        truncate_chars(&self.content, PREVIEW_CHARS)
    }

    pub fn short_title(&self) -> String {
        truncate_chars(&self.title, SHORT_TITLE_CHARS)
    }

    pub fn is_popular(&self) -> bool {
        self.rating > POPULAR_RATING_THRESHOLD
    }

    pub fn is_recent(&self, now: OffsetDateTime) -> bool {
        now - self.created_at < RECENT_WINDOW
    }
}

fn truncate_chars(value: &str, limit: usize) -> String {
    match value.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &value[..cut]),
        None => value.to_string(),
    }
}
