//! Mutation events.
//!
//! Write operations publish one event per committed mutation into an
//! in-process queue; the consumer drains it, so each event is delivered at
//! most once.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::domain::types::PostType;

use super::keys::PostRef;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Monotonic sequence number assigned at publish time.
pub type Epoch = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Post,
    Category,
    Comment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Post => "post",
            EntityKind::Category => "category",
            EntityKind::Comment => "comment",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Created => "created",
            MutationKind::Updated => "updated",
            MutationKind::Deleted => "deleted",
        })
    }
}

/// What changed, with just enough identity to derive the dependent cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntityChange {
    Post(PostRef),
    Category {
        category_id: i64,
    },
    Comment {
        comment_id: i64,
        post_id: i64,
        post_type: PostType,
    },
}

impl EntityChange {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityChange::Post(_) => EntityKind::Post,
            EntityChange::Category { .. } => EntityKind::Category,
            EntityChange::Comment { .. } => EntityKind::Comment,
        }
    }

    pub fn entity_id(&self) -> i64 {
        match self {
            EntityChange::Post(post) => post.id,
            EntityChange::Category { category_id } => *category_id,
            EntityChange::Comment { comment_id, .. } => *comment_id,
        }
    }

    /// Author owning the changed entity, when there is one.
    pub fn author_id(&self) -> Option<i64> {
        match self {
            EntityChange::Post(post) => Some(post.author_id),
            EntityChange::Category { .. } | EntityChange::Comment { .. } => None,
        }
    }

    pub fn category_ids(&self) -> &[i64] {
        match self {
            EntityChange::Post(post) => &post.category_ids,
            EntityChange::Category { .. } | EntityChange::Comment { .. } => &[],
        }
    }
}

/// One committed mutation of a post, category or comment.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    /// Unique identifier, used to drop duplicate deliveries.
    pub id: Uuid,
    pub epoch: Epoch,
    pub operation: MutationKind,
    pub change: EntityChange,
    pub timestamp: OffsetDateTime,
}

impl MutationEvent {
    pub fn new(operation: MutationKind, change: EntityChange, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            operation,
            change,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// In-memory FIFO of pending mutation events.
pub struct EventQueue {
    queue: Mutex<VecDeque<MutationEvent>>,
    epoch_counter: AtomicU64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            epoch_counter: AtomicU64::new(0),
        }
    }

    pub fn next_epoch(&self) -> Epoch {
        self.epoch_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Append an event for the given mutation and return its id.
    pub fn publish(&self, operation: MutationKind, change: EntityChange) -> Uuid {
        let event = MutationEvent::new(operation, change, self.next_epoch());

        info!(
            event_id = %event.id,
            event_epoch = event.epoch,
            entity_type = %event.change.kind(),
            entity_id = event.change.entity_id(),
            operation = %event.operation,
            author_id = ?event.change.author_id(),
            category_ids = ?event.change.category_ids(),
            "Mutation event enqueued"
        );

        let id = event.id;
        mutex_lock(&self.queue, SOURCE, "publish").push_back(event);
        id
    }

    /// Remove and return up to `limit` events in publish order.
    pub fn drain(&self, limit: usize) -> Vec<MutationEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        queue.drain(..count).collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
