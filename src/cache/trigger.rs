//! Cache trigger service.
//!
//! High-level API used by the write path: publish a mutation event once the
//! database write has committed, then consume it immediately so no reader can
//! observe a stale entry afterwards.

use std::sync::Arc;

use tracing::debug;

use crate::domain::entities::CategoryRecord;
use crate::domain::types::PostType;

use super::config::CacheConfig;
use super::consumer::{CacheConsumer, ConsumeOutcome};
use super::events::{EntityChange, EventQueue, MutationKind};
use super::invalidator::CacheInvalidator;
use super::keys::PostRef;
use super::store::CacheStore;

pub struct CacheTrigger {
    config: CacheConfig,
    queue: Arc<EventQueue>,
    consumer: Arc<CacheConsumer>,
}

impl CacheTrigger {
    pub fn new(config: CacheConfig, queue: Arc<EventQueue>, consumer: Arc<CacheConsumer>) -> Self {
        Self {
            config,
            queue,
            consumer,
        }
    }

    /// Wire a queue, invalidator and consumer around the given store.
    pub fn from_store(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(CacheConsumer::new(
            config.clone(),
            CacheInvalidator::new(store),
            queue.clone(),
        ));
        Self::new(config, queue, consumer)
    }

    /// Publish an event and, when `consume_now` is set, consume pending events.
    ///
    /// Must only be called after the mutation has committed.
    pub async fn trigger(
        &self,
        operation: MutationKind,
        change: EntityChange,
        consume_now: bool,
    ) -> Option<ConsumeOutcome> {
        if !self.config.enabled {
            debug!(
                entity_type = %change.kind(),
                entity_id = change.entity_id(),
                "Cache trigger skipped: cache disabled"
            );
            return None;
        }

        self.queue.publish(operation, change);

        if consume_now {
            Some(self.consumer.consume_all().await)
        } else {
            None
        }
    }

    pub async fn post_changed(&self, operation: MutationKind, post: PostRef) {
        self.trigger(operation, EntityChange::Post(post), true)
            .await;
    }

    /// Publish one event per post, consuming once after the last of them.
    pub async fn posts_changed(&self, operation: MutationKind, posts: Vec<PostRef>) {
        let Some(last) = posts.len().checked_sub(1) else {
            return;
        };
        for (index, post) in posts.into_iter().enumerate() {
            self.trigger(operation, EntityChange::Post(post), index == last)
                .await;
        }
    }

    pub async fn category_changed(&self, operation: MutationKind, category: &CategoryRecord) {
        self.trigger(
            operation,
            EntityChange::Category {
                category_id: category.id,
            },
            true,
        )
        .await;
    }

    pub async fn comment_changed(
        &self,
        operation: MutationKind,
        comment_id: i64,
        post_id: i64,
        post_type: PostType,
    ) {
        self.trigger(
            operation,
            EntityChange::Comment {
                comment_id,
                post_id,
                post_type,
            },
            true,
        )
        .await;
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn consumer(&self) -> &Arc<CacheConsumer> {
        &self.consumer
    }
}
