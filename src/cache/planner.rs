//! Invalidation plan generation.
//!
//! Merges a batch of mutation events into the deduplicated set of cache keys
//! to evict.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use super::events::{EntityKind, MutationEvent};
use super::keys::CacheKey;
use super::registry;

#[derive(Debug, Default)]
pub struct InvalidationPlan {
    /// Keys to delete from the store.
    pub keys: BTreeSet<CacheKey>,
    pub post_events: usize,
    pub category_events: usize,
    pub comment_events: usize,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvalidationPlan {{ keys: {}, posts: {}, categories: {}, comments: {} }}",
            self.keys.len(),
            self.post_events,
            self.category_events,
            self.comment_events,
        )
    }
}

impl InvalidationPlan {
    /// Merge events into a plan, ignoring repeated deliveries of the same event id.
    pub fn from_events(events: Vec<MutationEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            match event.change.kind() {
                EntityKind::Post => plan.post_events += 1,
                EntityKind::Category => plan.category_events += 1,
                EntityKind::Comment => plan.comment_events += 1,
            }
            plan.keys.extend(registry::keys_for_change(&event.change));
        }

        plan
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
