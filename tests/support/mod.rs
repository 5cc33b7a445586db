//! In-memory repository and cache fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use newsportal::application::catalog::CatalogService;
use newsportal::application::content::{ContentRepositories, ContentService};
use newsportal::application::rating::RatingService;
use newsportal::application::repos::{
    AuthorsRepo, CategoriesRepo, CategoriesWriteRepo, CommentsRepo, CommentsWriteRepo,
    CreateCommentParams, CreatePostParams, DeletedCategory, PostWithCategories, PostsRepo,
    PostsWriteRepo, RatingSourceRepo, RepoError, UpdatePostParams, UpdatedPost,
};
use newsportal::cache::{CacheConfig, CacheError, CacheKey, CacheStore, CacheTrigger, MemoryStore};
use newsportal::domain::entities::{
    AuthorRecord, CategoryRecord, CategoryWithCounts, CommentRecord, PostRecord,
};
use newsportal::domain::types::PostType;
use time::OffsetDateTime;

#[derive(Default)]
struct State {
    next_id: i64,
    authors: BTreeMap<i64, AuthorRecord>,
    posts: BTreeMap<i64, PostRecord>,
    post_categories: BTreeMap<i64, BTreeSet<i64>>,
    categories: BTreeMap<i64, CategoryRecord>,
    subscriptions: BTreeSet<(i64, i64)>,
    comments: BTreeMap<i64, CommentRecord>,
    stale_category_reads: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn categories_of(&self, post_id: i64) -> Vec<i64> {
        self.post_categories
            .get(&post_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn remove_post(&mut self, id: i64) -> Option<PostWithCategories> {
        let category_ids = self.categories_of(id);
        let post = self.posts.remove(&id)?;
        self.post_categories.remove(&id);
        self.comments.retain(|_, c| c.post_id != id);
        Some(PostWithCategories { post, category_ids })
    }

    fn posts_in_category(&self, category_id: i64, post_type: Option<PostType>) -> Vec<i64> {
        self.posts
            .values()
            .filter(|p| post_type.is_none_or(|t| p.post_type == t))
            .filter(|p| {
                self.post_categories
                    .get(&p.id)
                    .is_some_and(|ids| ids.contains(&category_id))
            })
            .map(|p| p.id)
            .collect()
    }

    fn check_categories(&self, ids: &[i64]) -> Result<(), RepoError> {
        match ids.iter().find(|id| !self.categories.contains_key(id)) {
            Some(id) => Err(RepoError::InvalidInput {
                message: format!("category {id} does not exist"),
            }),
            None => Ok(()),
        }
    }
}

/// Repository fake backed by ordered maps.
#[derive(Default)]
pub struct InMemoryRepo {
    state: Mutex<State>,
}

impl InMemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_author(&self, user_id: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.authors.insert(
            id,
            AuthorRecord {
                id,
                user_id,
                username: format!("user{user_id}"),
                rating: 0,
            },
        );
        id
    }

    pub fn add_category(&self, name: &str) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.categories.insert(
            id,
            CategoryRecord {
                id,
                name: name.to_string(),
            },
        );
        id
    }

    pub fn add_post(&self, author_id: i64, post_type: PostType, rating: i64, categories: &[i64]) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let now = OffsetDateTime::now_utc();
        state.posts.insert(
            id,
            PostRecord {
                id,
                author_id,
                post_type,
                title: format!("Post {id}"),
                content: format!("Body of post {id}"),
                rating,
                created_at: now,
                updated_at: now,
            },
        );
        state
            .post_categories
            .insert(id, categories.iter().copied().collect());
        id
    }

    pub fn add_comment(&self, post_id: i64, user_id: i64, rating: i64) -> i64 {
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.comments.insert(
            id,
            CommentRecord {
                id,
                post_id,
                user_id,
                text: format!("Comment {id}"),
                rating,
                created_at: OffsetDateTime::now_utc(),
            },
        );
        id
    }

    pub fn author_rating(&self, id: i64) -> i64 {
        self.state.lock().unwrap().authors[&id].rating
    }

    pub fn post_rating(&self, id: i64) -> i64 {
        self.state.lock().unwrap().posts[&id].rating
    }

    pub fn comment_rating(&self, id: i64) -> i64 {
        self.state.lock().unwrap().comments[&id].rating
    }

    pub fn has_post(&self, id: i64) -> bool {
        self.state.lock().unwrap().posts.contains_key(&id)
    }

    pub fn post_categories(&self, id: i64) -> Vec<i64> {
        self.state.lock().unwrap().categories_of(id)
    }

    /// Make category reads outside write operations return nothing, as a
    /// reader racing a concurrent writer could see.
    pub fn serve_stale_category_reads(&self) {
        self.state.lock().unwrap().stale_category_reads = true;
    }
}

#[async_trait]
impl RatingSourceRepo for InMemoryRepo {
    async fn sum_post_ratings(&self, author_id: i64) -> Result<Option<i64>, RepoError> {
        let state = self.state.lock().unwrap();
        let ratings: Vec<i64> = state
            .posts
            .values()
            .filter(|p| p.author_id == author_id)
            .map(|p| p.rating)
            .collect();
        Ok((!ratings.is_empty()).then(|| ratings.iter().sum()))
    }

    async fn sum_comment_ratings_by_user(&self, user_id: i64) -> Result<Option<i64>, RepoError> {
        let state = self.state.lock().unwrap();
        let ratings: Vec<i64> = state
            .comments
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.rating)
            .collect();
        Ok((!ratings.is_empty()).then(|| ratings.iter().sum()))
    }

    async fn sum_comment_ratings_on_author_posts(
        &self,
        author_id: i64,
    ) -> Result<Option<i64>, RepoError> {
        let state = self.state.lock().unwrap();
        let ratings: Vec<i64> = state
            .comments
            .values()
            .filter(|c| {
                state
                    .posts
                    .get(&c.post_id)
                    .is_some_and(|p| p.author_id == author_id)
            })
            .map(|c| c.rating)
            .collect();
        Ok((!ratings.is_empty()).then(|| ratings.iter().sum()))
    }
}

#[async_trait]
impl AuthorsRepo for InMemoryRepo {
    async fn find_by_id(&self, id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        Ok(self.state.lock().unwrap().authors.get(&id).cloned())
    }

    async fn find_by_user(&self, user_id: i64) -> Result<Option<AuthorRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .authors
            .values()
            .find(|a| a.user_id == user_id)
            .cloned())
    }

    async fn list_ids(&self) -> Result<Vec<i64>, RepoError> {
        Ok(self.state.lock().unwrap().authors.keys().copied().collect())
    }

    async fn store_rating(&self, author_id: i64, rating: i64) -> Result<(), RepoError> {
        let mut state = self.state.lock().unwrap();
        let author = state.authors.get_mut(&author_id).ok_or(RepoError::NotFound)?;
        author.rating = rating;
        Ok(())
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepo {
    async fn find_by_id(&self, id: i64) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.state.lock().unwrap().posts.get(&id).cloned())
    }

    async fn list_category_ids(&self, post_id: i64) -> Result<Vec<i64>, RepoError> {
        let state = self.state.lock().unwrap();
        if state.stale_category_reads {
            return Ok(Vec::new());
        }
        Ok(state.categories_of(post_id))
    }

    async fn list_latest_in_category(
        &self,
        category_id: i64,
        post_type: PostType,
        limit: u32,
    ) -> Result<Vec<PostRecord>, RepoError> {
        let state = self.state.lock().unwrap();
        let mut posts: Vec<PostRecord> = state
            .posts
            .values()
            .filter(|p| p.post_type == post_type)
            .filter(|p| {
                state
                    .post_categories
                    .get(&p.id)
                    .is_some_and(|ids| ids.contains(&category_id))
            })
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts.truncate(limit as usize);
        Ok(posts)
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryRepo {
    async fn create_post(
        &self,
        params: CreatePostParams,
    ) -> Result<PostWithCategories, RepoError> {
        {
            let state = self.state.lock().unwrap();
            state.check_categories(&params.category_ids)?;
        }
        let id = self.add_post(
            params.author_id,
            params.post_type,
            0,
            &params.category_ids,
        );
        let mut state = self.state.lock().unwrap();
        let post = state.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.title = params.title;
        post.content = params.content;
        let post = post.clone();
        Ok(PostWithCategories {
            post,
            category_ids: state.categories_of(id),
        })
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<UpdatedPost, RepoError> {
        let mut state = self.state.lock().unwrap();
        state.check_categories(&params.category_ids)?;
        let previous_categories = state.categories_of(params.id);
        let post = state.posts.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        let previous = post.clone();
        post.post_type = params.post_type;
        post.title = params.title;
        post.content = params.content;
        post.updated_at = OffsetDateTime::now_utc();
        let post = post.clone();
        state
            .post_categories
            .insert(params.id, params.category_ids.iter().copied().collect());
        Ok(UpdatedPost {
            previous: PostWithCategories {
                post: previous,
                category_ids: previous_categories,
            },
            current: PostWithCategories {
                post,
                category_ids: state.categories_of(params.id),
            },
        })
    }

    async fn delete_post(&self, id: i64) -> Result<PostWithCategories, RepoError> {
        self.state
            .lock()
            .unwrap()
            .remove_post(id)
            .ok_or(RepoError::NotFound)
    }

    async fn adjust_post_rating(&self, id: i64, delta: i64) -> Result<PostRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let post = state.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        post.rating += delta;
        Ok(post.clone())
    }

    async fn delete_posts_in_category(
        &self,
        category_id: i64,
        post_type: Option<PostType>,
    ) -> Result<Vec<PostWithCategories>, RepoError> {
        let mut state = self.state.lock().unwrap();
        let ids = state.posts_in_category(category_id, post_type);
        Ok(ids
            .into_iter()
            .filter_map(|id| state.remove_post(id))
            .collect())
    }
}

#[async_trait]
impl CategoriesRepo for InMemoryRepo {
    async fn find_by_id(&self, id: i64) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.state.lock().unwrap().categories.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .categories
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<CategoryRecord>, RepoError> {
        let mut categories: Vec<CategoryRecord> =
            self.state.lock().unwrap().categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCounts>, RepoError> {
        let state = self.state.lock().unwrap();
        let mut categories: Vec<CategoryWithCounts> = state
            .categories
            .values()
            .map(|category| {
                let count = |post_type: PostType| {
                    state
                        .post_categories
                        .iter()
                        .filter(|(_, ids)| ids.contains(&category.id))
                        .filter(|(post_id, _)| {
                            state
                                .posts
                                .get(post_id)
                                .is_some_and(|p| p.post_type == post_type)
                        })
                        .count() as i64
                };
                CategoryWithCounts {
                    id: category.id,
                    name: category.name.clone(),
                    news_count: count(PostType::News),
                    articles_count: count(PostType::Article),
                }
            })
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn list_subscribers(&self, category_id: i64) -> Result<Vec<i64>, RepoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|(_, category)| *category == category_id)
            .map(|(user, _)| *user)
            .collect())
    }
}

#[async_trait]
impl CategoriesWriteRepo for InMemoryRepo {
    async fn create_category(&self, name: &str) -> Result<CategoryRecord, RepoError> {
        {
            let state = self.state.lock().unwrap();
            if state.categories.values().any(|c| c.name == name) {
                return Err(RepoError::Duplicate {
                    constraint: "categories_name_key".to_string(),
                });
            }
        }
        let id = self.add_category(name);
        Ok(CategoryRecord {
            id,
            name: name.to_string(),
        })
    }

    async fn rename_category(&self, id: i64, name: &str) -> Result<CategoryRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        if state.categories.values().any(|c| c.name == name && c.id != id) {
            return Err(RepoError::Duplicate {
                constraint: "categories_name_key".to_string(),
            });
        }
        let category = state.categories.get_mut(&id).ok_or(RepoError::NotFound)?;
        category.name = name.to_string();
        Ok(category.clone())
    }

    async fn delete_category(&self, id: i64) -> Result<DeletedCategory, RepoError> {
        let mut state = self.state.lock().unwrap();
        let posts = state
            .posts_in_category(id, None)
            .into_iter()
            .filter_map(|post_id| {
                Some(PostWithCategories {
                    post: state.posts.get(&post_id)?.clone(),
                    category_ids: state.categories_of(post_id),
                })
            })
            .collect();
        let category = state.categories.remove(&id).ok_or(RepoError::NotFound)?;
        for ids in state.post_categories.values_mut() {
            ids.remove(&id);
        }
        state.subscriptions.retain(|(_, category)| *category != id);
        Ok(DeletedCategory { category, posts })
    }

    async fn subscribe(&self, user_id: i64, category_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .insert((user_id, category_id)))
    }

    async fn unsubscribe(&self, user_id: i64, category_id: i64) -> Result<bool, RepoError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .remove(&(user_id, category_id)))
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepo {
    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.state.lock().unwrap().comments.get(&id).cloned())
    }
}

#[async_trait]
impl CommentsWriteRepo for InMemoryRepo {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        if !self.has_post(params.post_id) {
            return Err(RepoError::NotFound);
        }
        let id = self.add_comment(params.post_id, params.user_id, 0);
        let mut state = self.state.lock().unwrap();
        let comment = state.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        comment.text = params.text;
        Ok(comment.clone())
    }

    async fn delete_comment(&self, id: i64) -> Result<CommentRecord, RepoError> {
        self.state
            .lock()
            .unwrap()
            .comments
            .remove(&id)
            .ok_or(RepoError::NotFound)
    }

    async fn adjust_comment_rating(
        &self,
        id: i64,
        delta: i64,
    ) -> Result<CommentRecord, RepoError> {
        let mut state = self.state.lock().unwrap();
        let comment = state.comments.get_mut(&id).ok_or(RepoError::NotFound)?;
        comment.rating += delta;
        Ok(comment.clone())
    }
}

/// Cache backend whose every operation fails.
pub struct UnavailableStore;

#[async_trait]
impl CacheStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(CacheError::unavailable("connection refused"))
    }
}

/// Services wired the way the binary wires them, over in-memory adapters.
pub struct Harness {
    pub repo: Arc<InMemoryRepo>,
    pub store: Arc<MemoryStore>,
    pub content: ContentService,
    pub catalog: CatalogService,
    pub rating: RatingService,
    pub trigger: Arc<CacheTrigger>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(CacheConfig::default(), false)
    }

    pub fn with_options(config: CacheConfig, recompute_on_write: bool) -> Self {
        let repo = InMemoryRepo::new();
        let store = Arc::new(MemoryStore::new(&config));
        let trigger = Arc::new(CacheTrigger::from_store(config.clone(), store.clone()));
        let rating = RatingService::new(repo.clone(), repo.clone());
        let content = ContentService::new(
            ContentRepositories::from_shared(repo.clone()),
            trigger.clone(),
            rating.clone(),
            recompute_on_write,
        );
        let catalog = CatalogService::new(
            repo.clone(),
            repo.clone(),
            store.clone(),
            &config,
        );

        Self {
            repo,
            store,
            content,
            catalog,
            rating,
            trigger,
        }
    }

    /// Store a placeholder value under every given key.
    pub async fn fill(&self, keys: &[CacheKey]) {
        for key in keys {
            self.store
                .set(&key.to_string(), Bytes::from_static(b"cached"), Duration::from_secs(3600))
                .await
                .unwrap();
        }
    }

    pub fn cached(&self, key: CacheKey) -> bool {
        self.store.contains(&key.to_string())
    }
}

/// Services wired over a cache backend that always fails.
pub fn unavailable_cache_services(
    repo: Arc<InMemoryRepo>,
) -> (ContentService, CatalogService) {
    let config = CacheConfig::default();
    let store: Arc<dyn CacheStore> = Arc::new(UnavailableStore);
    let trigger = Arc::new(CacheTrigger::from_store(config.clone(), store.clone()));
    let rating = RatingService::new(repo.clone(), repo.clone());
    let content = ContentService::new(
        ContentRepositories::from_shared(repo.clone()),
        trigger,
        rating,
        false,
    );
    let catalog = CatalogService::new(repo.clone(), repo, store, &config);
    (content, catalog)
}
