//! Cache consumer.
//!
//! Drains pending mutation events, merges them into an invalidation plan and
//! executes it against the store.

use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tracing::{info, instrument};
use uuid::Uuid;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::invalidator::{CacheInvalidator, InvalidationReport};
use super::planner::InvalidationPlan;

const METRIC_CACHE_CONSUME_MS: &str = "newsportal_cache_consume_ms";

/// Result of one consumption batch.
#[derive(Debug, Default)]
pub struct ConsumeOutcome {
    pub event_count: usize,
    pub report: InvalidationReport,
}

pub struct CacheConsumer {
    config: CacheConfig,
    invalidator: CacheInvalidator,
    queue: Arc<EventQueue>,
}

impl CacheConsumer {
    pub fn new(config: CacheConfig, invalidator: CacheInvalidator, queue: Arc<EventQueue>) -> Self {
        Self {
            config,
            invalidator,
            queue,
        }
    }

    /// Consume one batch of pending events.
    ///
    /// Returns `None` when the queue was empty.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> Option<ConsumeOutcome> {
        let started_at = Instant::now();
        let events = self.queue.drain(self.config.batch_limit());
        if events.is_empty() {
            return None;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = InvalidationPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            "Cache consumption starting"
        );

        let InvalidationPlan { keys, .. } = plan;
        let report = self.invalidator.invalidate_keys(keys).await;

        info!(
            event_count,
            invalidated = report.deleted.len(),
            failed = report.failed.len(),
            "Cache consumption complete"
        );

        histogram!(METRIC_CACHE_CONSUME_MS)
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        Some(ConsumeOutcome {
            event_count,
            report,
        })
    }

    /// Consume batches until the queue is empty.
    pub async fn consume_all(&self) -> ConsumeOutcome {
        let mut total = ConsumeOutcome::default();
        while let Some(outcome) = self.consume().await {
            total.event_count += outcome.event_count;
            total.report.merge(outcome.report);
        }
        total
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    pub fn invalidator(&self) -> &CacheInvalidator {
        &self.invalidator
    }
}
