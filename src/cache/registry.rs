//! Entity → cache key registry.
//!
//! A pure mapping from a changed entity to the finite set of cache keys whose
//! values may have become stale. Invalidation is coarse: any save or delete
//! evicts the full set, regardless of which fields changed.

use std::collections::BTreeSet;

use super::events::EntityChange;
use super::keys::{CacheKey, PostRef};

/// Keys derived from a post: its detail view, every list view, and the
/// related-articles block of each category it belongs to.
pub fn keys_for_post(post: &PostRef) -> BTreeSet<CacheKey> {
    let mut keys = BTreeSet::new();
    keys.insert(post.detail_key());
    keys.extend(CacheKey::POST_LIST_KEYS);
    keys.extend(
        post.category_ids
            .iter()
            .map(|category_id| CacheKey::related_articles(*category_id)),
    );
    keys
}

/// Keys derived from a category: only the cached category listing.
pub fn keys_for_category(_category_id: i64) -> BTreeSet<CacheKey> {
    BTreeSet::from([CacheKey::Categories])
}

/// Resolve every key that depends on the given change.
pub fn keys_for_change(change: &EntityChange) -> BTreeSet<CacheKey> {
    match change {
        EntityChange::Post(post) => keys_for_post(post),
        EntityChange::Category { category_id } => keys_for_category(*category_id),
        EntityChange::Comment {
            post_id, post_type, ..
        } => BTreeSet::from([CacheKey::post_detail(*post_type, *post_id)]),
    }
}
