//! Service wiring shared by the binary and embedding hosts.

use std::sync::Arc;

use crate::application::catalog::CatalogService;
use crate::application::content::{ContentRepositories, ContentService};
use crate::application::rating::RatingService;
use crate::application::repos::{
    AuthorsRepo, CategoriesRepo, CategoriesWriteRepo, CommentsRepo, CommentsWriteRepo, PostsRepo,
    PostsWriteRepo, RatingSourceRepo,
};
use crate::cache::{CacheConfig, CacheTrigger, MemoryStore};
use crate::config::Settings;

pub struct ApplicationContext {
    pub rating: RatingService,
    pub content: ContentService,
    pub catalog: CatalogService,
    pub cache_trigger: Arc<CacheTrigger>,
    pub cache_store: Arc<MemoryStore>,
}

impl ApplicationContext {
    /// Build every service over one repository adapter and a fresh in-memory cache.
    pub fn new<R>(repositories: Arc<R>, settings: &Settings) -> Self
    where
        R: AuthorsRepo
            + RatingSourceRepo
            + PostsRepo
            + PostsWriteRepo
            + CategoriesRepo
            + CategoriesWriteRepo
            + CommentsRepo
            + CommentsWriteRepo
            + 'static,
    {
        let cache_config = CacheConfig::from(&settings.cache);
        let cache_store = Arc::new(MemoryStore::new(&cache_config));
        let cache_trigger = Arc::new(CacheTrigger::from_store(
            cache_config.clone(),
            cache_store.clone(),
        ));

        let rating = RatingService::new(repositories.clone(), repositories.clone());
        let content = ContentService::new(
            ContentRepositories::from_shared(repositories.clone()),
            cache_trigger.clone(),
            rating.clone(),
            settings.rating.recompute_on_write,
        );
        let catalog = CatalogService::new(
            repositories.clone(),
            repositories,
            cache_store.clone(),
            &cache_config,
        );

        Self {
            rating,
            content,
            catalog,
            cache_trigger,
            cache_store,
        }
    }
}
