//! Newsportal cache layer.
//!
//! Cached views are stored under names derived from typed [`CacheKey`]s. Every
//! committed write publishes a [`MutationEvent`]; the consumer turns the
//! pending events into an [`InvalidationPlan`] and evicts the affected keys
//! before the write path returns.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! default_ttl_seconds = 3600
//! capacity = 1000
//! consume_batch_limit = 100
//! ```

mod config;
mod consumer;
mod events;
mod invalidator;
mod keys;
mod lock;
mod planner;
pub mod registry;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use consumer::{CacheConsumer, ConsumeOutcome};
pub use events::{EntityChange, EntityKind, Epoch, EventQueue, MutationEvent, MutationKind};
pub use invalidator::{CacheInvalidator, InvalidationReport};
pub use keys::{CacheKey, PostRef};
pub use planner::InvalidationPlan;
pub use store::{CacheError, CacheStore, MemoryStore, get_json, set_json};
pub use trigger::CacheTrigger;
