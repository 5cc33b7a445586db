use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use metrics_util::debugging::DebuggingRecorder;
use newsportal::cache::{
    CacheConfig, CacheInvalidator, CacheKey, CacheStore, CacheTrigger, MemoryStore, MutationKind,
    PostRef,
};
use newsportal::domain::types::PostType;

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let config = CacheConfig {
        capacity: 1,
        ..Default::default()
    };
    let store = Arc::new(MemoryStore::new(&config));

    assert!(store.get("news_list").await.unwrap().is_none());
    store
        .set("news_list", Bytes::from_static(b"[]"), Duration::from_secs(60))
        .await
        .unwrap();
    assert!(store.get("news_list").await.unwrap().is_some());
    store
        .set("article_list", Bytes::from_static(b"[]"), Duration::from_secs(60))
        .await
        .unwrap();

    let invalidator = CacheInvalidator::new(store.clone());
    invalidator
        .invalidate_keys([CacheKey::ArticleList].into_iter().collect())
        .await;

    let trigger = CacheTrigger::from_store(CacheConfig::default(), store.clone());
    trigger
        .post_changed(
            MutationKind::Updated,
            PostRef {
                id: 3,
                post_type: PostType::News,
                author_id: 1,
                category_ids: vec![2],
            },
        )
        .await;

    let keys: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(key, _, _, _)| key.key().name().to_string())
        .collect();

    for expected in [
        "newsportal_cache_hit_total",
        "newsportal_cache_miss_total",
        "newsportal_cache_evict_total",
        "newsportal_cache_invalidated_total",
        "newsportal_cache_consume_ms",
    ] {
        assert!(keys.contains(expected), "missing metric {expected}");
    }
}
